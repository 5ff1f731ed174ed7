//! Reply keyboard builders and the mapping between button captions and
//! abstract menu choices.

use teloxide::types::{KeyboardButton, KeyboardMarkup, ReplyMarkup};

use crate::dialogue::{Keyboard, MenuChoice};

/// Подпись постоянной кнопки запроса встречи
pub const MEET_BUTTON: &str = "🚀 Устроить встречу";
/// Подписи кнопок выбора категории
pub const CATEGORY_FRIENDSHIP: &str = "🤝 Дружба";
pub const CATEGORY_COLLAB: &str = "💡 Сотворчество";
pub const CATEGORY_LOVE: &str = "❤️ Отношения";
/// Подписи кнопок выбора пола
pub const GENDER_MALE: &str = "Мужской";
pub const GENDER_FEMALE: &str = "Женский";

/// Persistent single-button keyboard with the meet request.
pub fn meet_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(MEET_BUTTON)]]).resize_keyboard()
}

/// One-time keyboard with the three meeting categories.
pub fn category_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(CATEGORY_FRIENDSHIP)],
        vec![KeyboardButton::new(CATEGORY_COLLAB)],
        vec![KeyboardButton::new(CATEGORY_LOVE)],
    ])
    .resize_keyboard()
    .one_time_keyboard()
}

/// One-time keyboard with the two gender options.
pub fn gender_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(GENDER_MALE)],
        vec![KeyboardButton::new(GENDER_FEMALE)],
    ])
    .resize_keyboard()
    .one_time_keyboard()
}

/// Maps a controller keyboard hint to Telegram reply markup.
pub fn render(keyboard: Keyboard) -> Option<ReplyMarkup> {
    match keyboard {
        Keyboard::MeetButton => Some(ReplyMarkup::Keyboard(meet_keyboard())),
        Keyboard::Categories => Some(ReplyMarkup::Keyboard(category_keyboard())),
        Keyboard::Genders => Some(ReplyMarkup::Keyboard(gender_keyboard())),
        Keyboard::Remove => Some(ReplyMarkup::kb_remove()),
        Keyboard::None => None,
    }
}

/// Recognizes button captions in incoming text.
///
/// Reply keyboards send the caption back as a plain message, so this is the
/// only way a button press reaches the bot.
pub fn menu_choice_from_label(text: &str) -> Option<MenuChoice> {
    match text.trim() {
        MEET_BUTTON => Some(MenuChoice::RequestMeeting),
        CATEGORY_FRIENDSHIP => Some(MenuChoice::Friendship),
        CATEGORY_COLLAB => Some(MenuChoice::Collab),
        CATEGORY_LOVE => Some(MenuChoice::Love),
        GENDER_MALE => Some(MenuChoice::Male),
        GENDER_FEMALE => Some(MenuChoice::Female),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_captions_map_to_choices() {
        assert_eq!(
            menu_choice_from_label("🚀 Устроить встречу"),
            Some(MenuChoice::RequestMeeting)
        );
        assert_eq!(
            menu_choice_from_label("  🤝 Дружба  "),
            Some(MenuChoice::Friendship)
        );
        assert_eq!(menu_choice_from_label("Мужской"), Some(MenuChoice::Male));
        assert_eq!(menu_choice_from_label("Женский"), Some(MenuChoice::Female));
        assert_eq!(menu_choice_from_label("что-то ещё"), None);
    }

    #[test]
    fn every_keyboard_caption_is_recognized() {
        for caption in [
            MEET_BUTTON,
            CATEGORY_FRIENDSHIP,
            CATEGORY_COLLAB,
            CATEGORY_LOVE,
            GENDER_MALE,
            GENDER_FEMALE,
        ] {
            assert!(menu_choice_from_label(caption).is_some(), "{caption}");
        }
    }
}
