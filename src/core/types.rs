//! Closed domain enums shared by storage, dialogue, and matching.
//!
//! User input for these enums always goes through [`Category::parse`] /
//! [`Gender::parse`], which normalize case and accept both the wire labels
//! and the Russian button captions. Everything outside the closed set is
//! rejected by the dialogue layer with a re-prompt.

/// Категория встречи, которую ищет участник.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Friendship,
    Collab,
    Love,
}

impl Category {
    /// Значение, в котором категория хранится в базе данных.
    pub fn as_db(self) -> &'static str {
        match self {
            Category::Friendship => "friendship",
            Category::Collab => "collab",
            Category::Love => "love",
        }
    }

    /// Читает категорию из значения базы данных.
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "friendship" => Some(Category::Friendship),
            "collab" => Some(Category::Collab),
            "love" => Some(Category::Love),
            _ => None,
        }
    }

    /// Разбирает пользовательский ввод: метку выбора или текст кнопки,
    /// без учёта регистра и окружающих пробелов.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "friendship" | "дружба" | "🤝 дружба" => Some(Category::Friendship),
            "collab" | "сотворчество" | "💡 сотворчество" => Some(Category::Collab),
            "love" | "отношения" | "❤️ отношения" => Some(Category::Love),
            _ => None,
        }
    }

    /// Русское название категории для сообщений пользователю.
    pub fn display_ru(self) -> &'static str {
        match self {
            Category::Friendship => "Дружба",
            Category::Collab => "Сотворчество",
            Category::Love => "Отношения",
        }
    }
}

/// Пол участника. Используется только для категории «Отношения»;
/// модель бинарная, подбор идёт строго по противоположному полу.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// Значение, в котором пол хранится в базе данных.
    pub fn as_db(self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    /// Читает пол из значения базы данных.
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            _ => None,
        }
    }

    /// Разбирает пользовательский ввод без учёта регистра.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "male" | "мужской" => Some(Gender::Male),
            "female" | "женский" => Some(Gender::Female),
            _ => None,
        }
    }

    /// Русское название с заглавной буквы для карточек встреч.
    pub fn display_ru(self) -> &'static str {
        match self {
            Gender::Male => "Мужской",
            Gender::Female => "Женский",
        }
    }

    /// Противоположный пол для фильтра кандидатов.
    pub fn opposite(self) -> Self {
        match self {
            Gender::Male => Gender::Female,
            Gender::Female => Gender::Male,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_is_case_insensitive() {
        assert_eq!(Category::parse("FRIENDSHIP"), Some(Category::Friendship));
        assert_eq!(Category::parse("Дружба"), Some(Category::Friendship));
        assert_eq!(Category::parse("  сотворчество  "), Some(Category::Collab));
        assert_eq!(Category::parse("❤️ Отношения"), Some(Category::Love));
        assert_eq!(Category::parse("чепуха"), None);
        assert_eq!(Category::parse(""), None);
    }

    #[test]
    fn gender_parse_accepts_labels_and_wire_values() {
        assert_eq!(Gender::parse("Мужской"), Some(Gender::Male));
        assert_eq!(Gender::parse("ЖЕНСКИЙ"), Some(Gender::Female));
        assert_eq!(Gender::parse("male"), Some(Gender::Male));
        assert_eq!(Gender::parse("другое"), None);
    }

    #[test]
    fn gender_opposite_is_involutive() {
        assert_eq!(Gender::Male.opposite(), Gender::Female);
        assert_eq!(Gender::Female.opposite(), Gender::Male);
        assert_eq!(Gender::Male.opposite().opposite(), Gender::Male);
    }

    #[test]
    fn db_round_trip() {
        for cat in [Category::Friendship, Category::Collab, Category::Love] {
            assert_eq!(Category::from_db(cat.as_db()), Some(cat));
        }
        for gender in [Gender::Male, Gender::Female] {
            assert_eq!(Gender::from_db(gender.as_db()), Some(gender));
        }
        assert_eq!(Category::from_db("unknown"), None);
        assert_eq!(Gender::from_db(""), None);
    }

    #[test]
    fn display_forms_are_capitalized() {
        assert_eq!(Gender::Male.display_ru(), "Мужской");
        assert_eq!(Gender::Female.display_ru(), "Женский");
        assert_eq!(Category::Collab.display_ru(), "Сотворчество");
    }
}
