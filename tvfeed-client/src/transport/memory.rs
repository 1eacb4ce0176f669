//! In-memory транспорт.
//!
//! [`pair`] отдаёт половины для сессии и [`VendorEnd`] - "сервер",
//! которым тест читает исходящие команды и подкладывает входящие события.

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tvfeed_core::Command;
use tvfeed_core::wire::{self, Fragment};

use super::{FrameSink, FrameSource};
use crate::error::TransportError;

pub struct MemorySink {
    tx: Option<mpsc::UnboundedSender<String>>,
}

pub struct MemorySource {
    rx: mpsc::UnboundedReceiver<Result<String, TransportError>>,
}

/// Серверная сторона in-memory соединения
pub struct VendorEnd {
    outbound: mpsc::UnboundedReceiver<String>,
    inbound: Option<mpsc::UnboundedSender<Result<String, TransportError>>>,
}

pub fn pair() -> (MemorySink, MemorySource, VendorEnd) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();

    (
        MemorySink { tx: Some(out_tx) },
        MemorySource { rx: in_rx },
        VendorEnd {
            outbound: out_rx,
            inbound: Some(in_tx),
        },
    )
}

#[async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(text).map_err(|_| TransportError::Closed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.tx = None;
        Ok(())
    }
}

#[async_trait]
impl FrameSource for MemorySource {
    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.rx.recv().await
    }
}

impl VendorEnd {
    /// Следующее сырое сообщение клиента; `None` - клиент закрыл соединение
    pub async fn next_frame(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    /// Следующая команда клиента, heartbeat-эхо пропускаются
    pub async fn next_command(&mut self) -> Option<Command> {
        loop {
            let frame = self.outbound.recv().await?;
            let command = wire::decode(&frame).find_map(|f| match f {
                Fragment::Event(obj) => Command::from_object(&obj),
                _ => None,
            });
            if command.is_some() {
                return command;
            }
        }
    }

    /// Уже отправленное клиентом, без ожидания
    pub fn try_next_frame(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Подкладывает сырое сообщение; `false`, если читатель уже остановлен
    pub fn push(&self, text: impl Into<String>) -> bool {
        match &self.inbound {
            Some(tx) => tx.send(Ok(text.into())).is_ok(),
            None => false,
        }
    }

    /// Подкладывает событие `{"m": name, "p": params}` одним фреймом
    pub fn push_event(&self, name: &str, params: Value) -> bool {
        let payload = json!({ "m": name, "p": params }).to_string();
        self.push(wire::frame(&payload))
    }

    /// Подкладывает heartbeat `~h~<n>`
    pub fn push_heartbeat(&self, n: u64) -> bool {
        self.push(wire::frame(&format!("~h~{n}")))
    }

    /// Имитирует сбой чтения
    pub fn fail(&self, error: TransportError) -> bool {
        match &self.inbound {
            Some(tx) => tx.send(Err(error)).is_ok(),
            None => false,
        }
    }

    /// Закрывает соединение со стороны сервера
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Перестаёт принимать сообщения клиента: следующая отправка сессии
    /// закончится `TransportError::Closed`, чтение при этом живо
    pub fn refuse_frames(&mut self) {
        self.outbound.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvfeed_core::protocol;

    #[tokio::test]
    async fn frames_cross_in_both_directions() {
        let (mut sink, mut source, mut vendor) = pair();

        let frame = protocol::set_auth_token("tok").encode().unwrap();
        sink.send(frame.clone()).await.unwrap();
        sink.send(wire::frame("~h~1")).await.unwrap();
        sink.send(protocol::quote_create_session("qs_x").encode().unwrap())
            .await
            .unwrap();

        let cmd = vendor.next_command().await.unwrap();
        assert_eq!(cmd.name, "set_auth_token");
        // heartbeat пропущен
        let cmd = vendor.next_command().await.unwrap();
        assert_eq!(cmd.name, "quote_create_session");

        assert!(vendor.push_event("series_completed", json!(["cs_x"])));
        let got = source.recv().await.unwrap().unwrap();
        assert_eq!(
            got,
            r#"~m~37~m~{"m":"series_completed","p":["cs_x"]}"#
        );
    }

    #[tokio::test]
    async fn hang_up_ends_source_and_close_ends_sink() {
        let (mut sink, mut source, mut vendor) = pair();

        vendor.hang_up();
        assert!(source.recv().await.is_none());
        assert!(!vendor.push("late"));

        sink.close().await.unwrap();
        assert_eq!(sink.send("x".into()).await, Err(TransportError::Closed));
        assert!(vendor.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn refused_frames_fail_send_and_failure_reaches_source() {
        let (mut sink, mut source, mut vendor) = pair();

        vendor.refuse_frames();
        assert_eq!(sink.send("x".into()).await, Err(TransportError::Closed));

        assert!(vendor.fail(TransportError::Receive("reset".into())));
        assert_eq!(
            source.recv().await,
            Some(Err(TransportError::Receive("reset".into())))
        );
    }
}
