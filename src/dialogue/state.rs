//! Шаги многоходового диалога с участником.

use crate::core::types::Category;

/// Состояние незавершённого диалога.
///
/// Отсутствие записи в [`super::DialogueStore`] означает, что диалога нет
/// («idle»). Состояние живёт только в памяти процесса: после рестарта
/// участник просто начинает прерванный диалог заново.
///
/// Регистрация: имя → о себе → категория → {творчество | пол | готово}.
/// Перед подбором: категория встречи → {творчество | пол}, если нужный
/// атрибут ещё не сохранён в профиле.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    /// Регистрация: ждём имя.
    AwaitingName,
    /// Регистрация: ждём рассказ о себе.
    AwaitingBio { name: String },
    /// Регистрация: ждём выбор категории.
    AwaitingCategory { name: String, bio: String },
    /// Регистрация в «Сотворчестве»: ждём описание творчества.
    AwaitingCreativity { name: String, bio: String },
    /// Регистрация в «Отношениях»: ждём пол.
    AwaitingGender { name: String, bio: String },
    /// Перед подбором: ждём выбор категории встречи.
    AwaitingMeetCategory,
    /// Перед подбором в «Сотворчестве»: ждём описание творчества.
    AwaitingMeetCreativity,
    /// Перед подбором в «Отношениях»: ждём пол.
    AwaitingMeetGender,
}

impl ConversationState {
    /// Начальный шаг диалога перед подбором, собирающий недостающий
    /// атрибут категории.
    pub fn meet_attribute_step(category: Category) -> Option<Self> {
        match category {
            Category::Collab => Some(ConversationState::AwaitingMeetCreativity),
            Category::Love => Some(ConversationState::AwaitingMeetGender),
            Category::Friendship => None,
        }
    }
}

/// Обрезает текст и отклоняет пустой или состоящий из одних пробелов ввод.
pub fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
