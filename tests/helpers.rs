use cometd_mock::{Message, ServerHandle};

/// Handshake and return the issued clientId.
#[allow(dead_code)]
pub(crate) async fn handshake_id(server: &ServerHandle) -> String {
    let reply = server
        .handshake(Message::handshake())
        .await
        .expect("handshake");
    assert_eq!(reply.successful, Some(true));
    reply.client_id.expect("clientId issued")
}

#[allow(dead_code)]
pub(crate) fn configure_tracing() {
    use std::sync::OnceLock;
    static TRACING_INIT: OnceLock<()> = OnceLock::new();
    TRACING_INIT.get_or_init(|| {
        tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::builder()
                        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                        .from_env_lossy(),
                )
                .with_test_writer()
                .finish(),
        )
        .expect("Configure tracing");
    });
}
