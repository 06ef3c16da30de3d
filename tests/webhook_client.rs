use std::time::Duration;

use chamados::chat::webhook::{WebhookClient, WebhookError};
use chamados::core::shared::enums::SenderKind;
use mockito::Matcher;
use serde_json::json;

fn client_for(server: &mockito::ServerGuard) -> WebhookClient {
    WebhookClient::new(format!("{}/hook", server.url()), Duration::from_secs(5))
        .expect("client")
}

#[tokio::test]
async fn test_send_message_posts_action_and_reads_new_ticket() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "action": "enviar_mensagem",
            "payload": {
                "remetente_id": "conv-1",
                "tipo_remetente": "usuario",
                "texto_mensagem": "Teclado quebrado"
            }
        })))
        .with_status(200)
        .with_body(r#"{"novo_chamado_id": 17, "status": "ok"}"#)
        .create_async()
        .await;

    let answer = client_for(&server)
        .send_message(None, "conv-1", SenderKind::Usuario, "Teclado quebrado")
        .await
        .expect("webhook answer");

    mock.assert_async().await;
    assert_eq!(answer.novo_chamado_id, Some(17));
    assert_eq!(answer.extra.get("status"), Some(&json!("ok")));
}

#[tokio::test]
async fn test_empty_answer_is_accepted() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_body(Matcher::Json(json!({
            "action": "assumir_chamado",
            "payload": {"conversation_id": 8, "tecnico_id": "2"}
        })))
        .with_status(204)
        .create_async()
        .await;

    let answer = client_for(&server).claim_ticket(8, 2).await.expect("answer");

    mock.assert_async().await;
    assert_eq!(answer.novo_chamado_id, None);
    assert!(answer.extra.is_empty());
}

#[tokio::test]
async fn test_transfer_sends_new_technician() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/hook")
        .match_body(Matcher::PartialJson(json!({
            "action": "transferir_chamado",
            "payload": {"novo_tecnico_id": "5"}
        })))
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    client_for(&server).transfer_ticket(8, 5).await.expect("answer");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/hook")
        .with_status(503)
        .with_body("indisponível")
        .create_async()
        .await;

    let err = client_for(&server)
        .send_message(Some(3), "7", SenderKind::Tecnico, "Olá")
        .await
        .unwrap_err();

    match err {
        WebhookError::Status { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "indisponível");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_non_json_answer_is_a_decode_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/hook")
        .with_status(200)
        .with_body("<html>ok</html>")
        .create_async()
        .await;

    let err = client_for(&server).claim_ticket(1, 1).await.unwrap_err();
    assert!(matches!(err, WebhookError::Decode(_)));
}
