use std::sync::Mutex;

use tokio::sync::oneshot;

use crate::error::SessionError;

pub(crate) type AckReceiver = oneshot::Receiver<Result<(), SessionError>>;

struct Awaiting {
    name: String,
    done: oneshot::Sender<Result<(), SessionError>>,
}

/// Ожидание подтверждения команды.
///
/// Одновременно ждём не больше одного события. Писатель взводит гейт
/// до отправки команды, читатель отпускает его, увидев событие с тем
/// же именем. Очерёдность команд держит очередь писателя, поэтому
/// повторный `arm` при взведённом гейте - ошибка, а не ожидание.
pub(crate) struct CorrelationGate {
    slot: Mutex<Option<Awaiting>>,
}

impl CorrelationGate {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Awaiting>> {
        match self.slot.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Idle -> ждём `name`
    pub(crate) fn arm(&self, name: &str) -> Result<AckReceiver, SessionError> {
        let mut slot = self.slot();

        if let Some(current) = slot.as_ref() {
            return Err(SessionError::GateBusy {
                awaiting: current.name.clone(),
            });
        }

        let (done, rx) = oneshot::channel();
        *slot = Some(Awaiting {
            name: name.to_string(),
            done,
        });
        Ok(rx)
    }

    /// Событие `name` пришло; `true`, если именно его и ждали
    pub(crate) fn release(&self, name: &str) -> bool {
        let mut slot = self.slot();

        if slot.as_ref().is_none_or(|a| a.name != name) {
            return false;
        }

        if let Some(awaiting) = slot.take() {
            // ждущий мог уже уйти по таймауту
            let _ = awaiting.done.send(Ok(()));
        }
        true
    }

    /// Завершает ожидание ошибкой (читатель остановился)
    pub(crate) fn fail(&self, error: SessionError) -> bool {
        match self.slot().take() {
            Some(awaiting) => {
                let _ = awaiting.done.send(Err(error));
                true
            }
            None => false,
        }
    }

    /// Снимает ожидание без результата; имя, если что-то ждали
    pub(crate) fn cancel(&self) -> Option<String> {
        self.slot().take().map(|a| a.name)
    }

    #[cfg(test)]
    pub(crate) fn awaiting(&self) -> Option<String> {
        self.slot().as_ref().map(|a| a.name.clone())
    }
}
