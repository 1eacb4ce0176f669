use std::sync::Arc;

use tokio::sync::watch;

/// Общий флаг остановки сессии.
///
/// Выставляется один раз: закрытием сессии, фатальной ошибкой сервера
/// или обрывом соединения. Ждать его можно из `select!`.
#[derive(Clone)]
pub(crate) struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// `true`, если флаг выставлен этим вызовом
    pub(crate) fn trigger(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub(crate) fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // отправитель живёт в self, ошибки быть не может
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}
