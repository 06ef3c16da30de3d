diesel::table! {
    chamados_ti (id_chamado) {
        id_chamado -> Int8,
        session_id -> Nullable<Varchar>,
        nome_funcionario -> Nullable<Varchar>,
        email -> Nullable<Varchar>,
        telefone_contato -> Nullable<Varchar>,
        departamento -> Nullable<Varchar>,
        loja -> Nullable<Varchar>,
        descricao_problema -> Nullable<Text>,
        anexos -> Jsonb,
        status -> Varchar,
        prioridade -> Nullable<Varchar>,
        tentativas_ia -> Nullable<Int4>,
        tecnico_responsavel -> Nullable<Varchar>,
        assigned_func_ti_id -> Nullable<Int8>,
        solucao_aplicada -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    chamados_ti_historico (id) {
        id -> Int8,
        chamado_id -> Int8,
        actor -> Varchar,
        message -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    chamados_ti_anexos (id) {
        id -> Int8,
        id_chamado -> Int8,
        file_path -> Text,
        tipo -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    funcionarios_ti (id) {
        id -> Int8,
        nome -> Varchar,
        email -> Varchar,
        permissao -> Varchar,
        senha_hash -> Varchar,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    mensagens_chat (id) {
        id -> Int8,
        chamado_id -> Int8,
        remetente_id -> Varchar,
        tipo_remetente -> Varchar,
        texto_mensagem -> Text,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(chamados_ti -> funcionarios_ti (assigned_func_ti_id));
diesel::joinable!(chamados_ti_historico -> chamados_ti (chamado_id));
diesel::joinable!(chamados_ti_anexos -> chamados_ti (id_chamado));
diesel::joinable!(mensagens_chat -> chamados_ti (chamado_id));

diesel::allow_tables_to_appear_in_same_query!(
    chamados_ti,
    chamados_ti_historico,
    chamados_ti_anexos,
    funcionarios_ti,
    mensagens_chat,
);
