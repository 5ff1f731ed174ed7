use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::state::ConversationState;

/// Хранилище незавершённых диалогов, ключ - chat ID участника.
///
/// Помимо самих состояний держит по блокировке на участника: контроллер
/// захватывает её на время обработки хода, поэтому для одного участника
/// одновременно обрабатывается не больше одного хода, а ходы разных
/// участников идут параллельно.
#[derive(Clone, Default)]
pub struct DialogueStore {
    /// Текущие состояния диалогов
    states: Arc<Mutex<HashMap<i64, ConversationState>>>,
    /// Блокировки ходов, по одной на участника
    turn_locks: Arc<Mutex<HashMap<i64, Arc<Mutex<()>>>>>,
}

impl DialogueStore {
    /// Создает новое пустое хранилище диалогов.
    pub fn new() -> Self {
        Self::default()
    }

    /// Захватывает блокировку хода участника.
    ///
    /// Возвращённый guard держится до конца обработки хода.
    pub async fn begin_turn(&self, chat_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.turn_locks.lock().await;
            Arc::clone(locks.entry(chat_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Возвращает текущее состояние диалога участника, если диалог идёт.
    pub async fn get(&self, chat_id: i64) -> Option<ConversationState> {
        let states = self.states.lock().await;
        states.get(&chat_id).cloned()
    }

    /// Ставит участника на указанный шаг диалога.
    pub async fn set(&self, chat_id: i64, state: ConversationState) {
        let mut states = self.states.lock().await;
        states.insert(chat_id, state);
    }

    /// Завершает диалог участника (возврат в «idle»).
    pub async fn clear(&self, chat_id: i64) {
        let mut states = self.states.lock().await;
        states.remove(&chat_id);
    }
}
