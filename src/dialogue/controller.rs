//! Тонкий контроллер диалога: принимает события, двигает машину состояний,
//! дергает хранилище и движок подбора, переводит результаты в тексты.
//!
//! Бизнес-правил здесь нет, только маршрутизация событий по текущему шагу
//! диалога и сборка ответов.

use std::sync::Arc;

use crate::core::config;
use crate::core::error::AppResult;
use crate::core::types::{Category, Gender};
use crate::matching::engine::{self, MatchOutcome};
use crate::storage::db::{self, DbConnection, DbPool, Profile};

use super::state::{non_empty, ConversationState};
use super::store::DialogueStore;

const NO_CREDITS: &str = "Встреч не осталось — может, по стаканчику PIMS? 🍹";
const CREATIVITY_PROMPT: &str = "✍️ Опишите своё творчество тремя словами:";
const CREATIVITY_EMPTY: &str =
    "❗ Опишите своё творчество хотя бы одним предложением (три слова).";
const GENDER_PROMPT: &str = "🧭 Укажите ваш пол:";
const GENDER_INVALID: &str = "❗ Неверный ввод, выберите «Мужской» или «Женский».";

/// Входящее событие от участника, без привязки к транспорту.
#[derive(Debug, Clone)]
pub enum Event {
    /// Команда /start, возможно с токеном гранта из deep-link
    Start { payload: Option<String> },
    /// Свободный текст
    Text(String),
    /// Дискретный выбор из меню
    Menu(MenuChoice),
    /// Команда «устроить встречу»
    Meet,
    /// Запрос остатка встреч
    Count,
    /// Полный сброс данных участника
    Reset,
    /// Служебное начисление N встреч
    GrantCredits(i64),
}

/// Закрытый набор меток выбора из меню.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Friendship,
    Collab,
    Love,
    Male,
    Female,
    RequestMeeting,
}

/// Подсказка транспортному слою, какую клавиатуру показать с ответом.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// Постоянная кнопка «🚀 Устроить встречу»
    MeetButton,
    /// Выбор категории
    Categories,
    /// Выбор пола
    Genders,
    /// Убрать клавиатуру
    Remove,
    /// Оставить как есть
    None,
}

/// Один ответ участнику.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub keyboard: Keyboard,
}

impl Reply {
    pub fn new(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}

/// Уведомление второго участника о новом матче.
///
/// Доставка best-effort: пара уже зафиксирована в базе, неудачная отправка
/// логируется и ничего не откатывает.
#[derive(Debug, Clone)]
pub struct PartnerNotice {
    pub chat_id: i64,
    pub text: String,
}

/// Результат обработки одного события.
#[derive(Debug, Default)]
pub struct Outcome {
    pub replies: Vec<Reply>,
    pub notice: Option<PartnerNotice>,
}

impl Outcome {
    pub fn reply(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            replies: vec![Reply::new(text, keyboard)],
            notice: None,
        }
    }

    pub fn replies(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            notice: None,
        }
    }

    fn extend(&mut self, other: Outcome) {
        self.replies.extend(other.replies);
        if other.notice.is_some() {
            self.notice = other.notice;
        }
    }
}

impl From<Reply> for Outcome {
    fn from(reply: Reply) -> Self {
        Outcome {
            replies: vec![reply],
            notice: None,
        }
    }
}

/// Автор события: chat ID и username для поля «Контакт».
#[derive(Debug, Clone)]
pub struct UserRef {
    pub chat_id: i64,
    pub username: Option<String>,
}

/// Контроллер диалогов. Владеет хранилищем состояний; вся работа с
/// долговременными данными идёт через пул соединений.
pub struct DialogueController {
    db_pool: Arc<DbPool>,
    dialogues: DialogueStore,
}

impl DialogueController {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            db_pool,
            dialogues: DialogueStore::new(),
        }
    }

    /// Хранилище состояний диалогов (для интроспекции в тестах).
    pub fn dialogues(&self) -> &DialogueStore {
        &self.dialogues
    }

    /// Обрабатывает одно событие участника.
    ///
    /// На время обработки захватывается блокировка хода участника, поэтому
    /// для одного chat ID события применяются строго по одному.
    pub async fn handle(&self, user: &UserRef, event: Event) -> AppResult<Outcome> {
        let _turn = self.dialogues.begin_turn(user.chat_id).await;

        match event {
            Event::Start { payload } => self.on_start(user, payload).await,
            Event::Meet | Event::Menu(MenuChoice::RequestMeeting) => self.on_meet(user).await,
            Event::Count => self.on_count(user).await,
            Event::Reset => self.on_reset(user).await,
            Event::GrantCredits(amount) => self.on_grant(user, amount).await,
            Event::Menu(MenuChoice::Friendship) => {
                self.on_category_choice(user, Category::Friendship).await
            }
            Event::Menu(MenuChoice::Collab) => {
                self.on_category_choice(user, Category::Collab).await
            }
            Event::Menu(MenuChoice::Love) => self.on_category_choice(user, Category::Love).await,
            Event::Menu(MenuChoice::Male) => self.on_gender_choice(user, Gender::Male).await,
            Event::Menu(MenuChoice::Female) => self.on_gender_choice(user, Gender::Female).await,
            Event::Text(text) => self.on_text(user, &text).await,
        }
    }

    fn connection(&self) -> AppResult<DbConnection> {
        Ok(db::get_connection(&self.db_pool)?)
    }

    /// Команда /start: погашение гранта, меню для зарегистрированных,
    /// регистрация для новых участников.
    async fn on_start(&self, user: &UserRef, payload: Option<String>) -> AppResult<Outcome> {
        let mut conn = self.connection()?;
        let registered = db::get_profile(&conn, user.chat_id)?.is_some();

        if let Some(token) = payload.as_deref().and_then(non_empty) {
            if registered {
                let already = db::redeem_grant(&mut conn, user.chat_id, token)?;
                let text = if already {
                    "❗ Встреча уже зачислена"
                } else {
                    "➕ Встреча зачислена"
                };
                return Ok(Outcome::reply(text, Keyboard::MeetButton));
            }
            // Токен от незарегистрированного участника игнорируется
        }

        if registered {
            return Ok(Outcome::reply("📋", Keyboard::MeetButton));
        }
        self.begin_registration(user.chat_id, conn).await
    }

    /// Начинает регистрацию с чистого листа: прежний профиль, история пар
    /// и гранты удаляются.
    async fn begin_registration(&self, chat_id: i64, conn: DbConnection) -> AppResult<Outcome> {
        db::delete_all(&conn, chat_id)?;
        drop(conn);
        self.dialogues
            .set(chat_id, ConversationState::AwaitingName)
            .await;

        Ok(Outcome::replies(vec![
            Reply::new(
                "👋 Чтобы встречать друзей PIMS, нужно пройти короткую регистрацию.",
                Keyboard::None,
            ),
            Reply::new("📋 Введите своё имя:", Keyboard::Remove),
        ]))
    }

    /// Вход в запрос встречи: проверка профиля и остатка, затем выбор категории.
    async fn on_meet(&self, user: &UserRef) -> AppResult<Outcome> {
        let conn = self.connection()?;
        let profile = match db::get_profile(&conn, user.chat_id)? {
            Some(profile) => profile,
            None => return self.begin_registration(user.chat_id, conn).await,
        };

        if profile.credits < 1 {
            return Ok(Outcome::reply(NO_CREDITS, Keyboard::MeetButton));
        }

        drop(conn);
        self.dialogues
            .set(user.chat_id, ConversationState::AwaitingMeetCategory)
            .await;
        Ok(Outcome::reply(
            "🚀 Выберите категорию встречи:",
            Keyboard::Categories,
        ))
    }

    async fn on_count(&self, user: &UserRef) -> AppResult<Outcome> {
        let conn = self.connection()?;
        match db::get_profile(&conn, user.chat_id)? {
            Some(profile) => Ok(Outcome::reply(
                format!("У вас встреч: {}", profile.credits),
                Keyboard::MeetButton,
            )),
            None => self.begin_registration(user.chat_id, conn).await,
        }
    }

    async fn on_reset(&self, user: &UserRef) -> AppResult<Outcome> {
        let conn = self.connection()?;
        db::delete_all(&conn, user.chat_id)?;
        drop(conn);
        self.dialogues.clear(user.chat_id).await;
        Ok(Outcome::reply(
            "🧹 Данные удалены. Чтобы начать заново, отправьте /start.",
            Keyboard::MeetButton,
        ))
    }

    /// Служебное начисление встреч («встречи<N>»).
    async fn on_grant(&self, user: &UserRef, amount: i64) -> AppResult<Outcome> {
        if amount <= 0 {
            return Ok(Outcome::reply(
                "Неверный формат. Напишите «встречи<number>».",
                Keyboard::None,
            ));
        }

        let conn = self.connection()?;
        if db::get_profile(&conn, user.chat_id)?.is_none() {
            return self.begin_registration(user.chat_id, conn).await;
        }

        db::adjust_credits(&conn, user.chat_id, amount)?;
        let total = db::get_profile(&conn, user.chat_id)?
            .map(|profile| profile.credits)
            .unwrap_or(0);
        Ok(Outcome::reply(
            format!("🛠 Добавлено {amount} встреч. Всего: {total}"),
            Keyboard::MeetButton,
        ))
    }

    /// Выбор категории: смысл зависит от текущего шага диалога.
    async fn on_category_choice(&self, user: &UserRef, category: Category) -> AppResult<Outcome> {
        match self.dialogues.get(user.chat_id).await {
            Some(ConversationState::AwaitingCategory { name, bio }) => {
                self.advance_registration_category(user, name, bio, category)
                    .await
            }
            // Выбор категории без диалога значит то же, что запрос встречи в ней
            Some(ConversationState::AwaitingMeetCategory) | None => {
                self.start_match_flow(user, category).await
            }
            Some(other) => Ok(reprompt_for(&other)),
        }
    }

    /// Выбор пола значим только на шагах сбора пола.
    async fn on_gender_choice(&self, user: &UserRef, gender: Gender) -> AppResult<Outcome> {
        match self.dialogues.get(user.chat_id).await {
            Some(ConversationState::AwaitingGender { name, bio }) => {
                self.complete_registration(user, name, bio, Category::Love, None, Some(gender))
                    .await
            }
            Some(ConversationState::AwaitingMeetGender) => {
                self.save_meet_gender(user, gender).await
            }
            _ => Ok(Outcome::default()),
        }
    }

    /// Свободный текст: значение для текущего шага диалога.
    async fn on_text(&self, user: &UserRef, text: &str) -> AppResult<Outcome> {
        let state = match self.dialogues.get(user.chat_id).await {
            Some(state) => state,
            // Вне диалога свободный текст не обрабатывается
            None => return Ok(Outcome::default()),
        };
        let reprompt = reprompt_for(&state);

        match state {
            ConversationState::AwaitingName => match non_empty(text) {
                Some(name) => {
                    self.dialogues
                        .set(
                            user.chat_id,
                            ConversationState::AwaitingBio {
                                name: name.to_string(),
                            },
                        )
                        .await;
                    Ok(Outcome::reply(
                        "💬 Напишите о себе двумя словами:",
                        Keyboard::Remove,
                    ))
                }
                None => Ok(reprompt),
            },
            ConversationState::AwaitingBio { name } => match non_empty(text) {
                Some(bio) => {
                    self.dialogues
                        .set(
                            user.chat_id,
                            ConversationState::AwaitingCategory {
                                name,
                                bio: bio.to_string(),
                            },
                        )
                        .await;
                    Ok(Outcome::reply("🧭 Кого вы хотите найти?", Keyboard::Categories))
                }
                None => Ok(reprompt),
            },
            ConversationState::AwaitingCategory { name, bio } => match Category::parse(text) {
                Some(category) => {
                    self.advance_registration_category(user, name, bio, category)
                        .await
                }
                None => Ok(reprompt),
            },
            ConversationState::AwaitingCreativity { name, bio } => match non_empty(text) {
                Some(creativity) => {
                    self.complete_registration(
                        user,
                        name,
                        bio,
                        Category::Collab,
                        Some(creativity.to_string()),
                        None,
                    )
                    .await
                }
                None => Ok(reprompt),
            },
            ConversationState::AwaitingGender { name, bio } => match Gender::parse(text) {
                Some(gender) => {
                    self.complete_registration(user, name, bio, Category::Love, None, Some(gender))
                        .await
                }
                None => Ok(reprompt),
            },
            ConversationState::AwaitingMeetCategory => match Category::parse(text) {
                Some(category) => self.start_match_flow(user, category).await,
                None => Ok(reprompt),
            },
            ConversationState::AwaitingMeetCreativity => match non_empty(text) {
                Some(creativity) => self.save_meet_creativity(user, creativity).await,
                None => Ok(reprompt),
            },
            ConversationState::AwaitingMeetGender => match Gender::parse(text) {
                Some(gender) => self.save_meet_gender(user, gender).await,
                None => Ok(reprompt),
            },
        }
    }

    /// Категория выбрана на шаге регистрации: либо завершаем, либо идём
    /// собирать атрибут категории.
    async fn advance_registration_category(
        &self,
        user: &UserRef,
        name: String,
        bio: String,
        category: Category,
    ) -> AppResult<Outcome> {
        match category {
            Category::Friendship => {
                self.complete_registration(user, name, bio, category, None, None)
                    .await
            }
            Category::Collab => {
                self.dialogues
                    .set(
                        user.chat_id,
                        ConversationState::AwaitingCreativity { name, bio },
                    )
                    .await;
                Ok(Outcome::reply(CREATIVITY_PROMPT, Keyboard::Remove))
            }
            Category::Love => {
                self.dialogues
                    .set(user.chat_id, ConversationState::AwaitingGender { name, bio })
                    .await;
                Ok(Outcome::reply(GENDER_PROMPT, Keyboard::Genders))
            }
        }
    }

    /// Завершает регистрацию: сохраняет профиль с одной стартовой встречей.
    async fn complete_registration(
        &self,
        user: &UserRef,
        name: String,
        bio: String,
        category: Category,
        creativity: Option<String>,
        gender: Option<Gender>,
    ) -> AppResult<Outcome> {
        let conn = self.connection()?;
        let contact = user.username.as_ref().map(|username| format!("@{username}"));
        let profile = Profile {
            chat_id: user.chat_id,
            name,
            bio,
            contact,
            category,
            credits: config::registration::INITIAL_CREDITS,
            creativity,
            gender,
        };
        db::upsert_profile(&conn, &profile)?;
        drop(conn);
        self.dialogues.clear(user.chat_id).await;
        log::info!(
            "Registration completed for {} in category {}",
            user.chat_id,
            category.as_db()
        );

        let mut summary = format!(
            "✅ Регистрация завершена!\nВы ищете: {}\nИмя: {}\nО себе: {}\nКонтакт: {}",
            category.display_ru(),
            profile.name,
            profile.bio,
            profile.contact_display()
        );
        if let Some(ref creativity) = profile.creativity {
            summary.push_str(&format!("\n➕ Творчество: {creativity}"));
        }
        if let Some(gender) = profile.gender {
            summary.push_str(&format!("\n➕ Пол: {}", gender.display_ru()));
        }
        summary.push_str("\n➕ Зачислена 1 встреча.");

        Ok(Outcome::reply(summary, Keyboard::MeetButton))
    }

    /// Категория встречи выбрана: либо сразу подбор, либо добор атрибута.
    async fn start_match_flow(&self, user: &UserRef, category: Category) -> AppResult<Outcome> {
        let conn = self.connection()?;
        let profile = match db::get_profile(&conn, user.chat_id)? {
            Some(profile) => profile,
            None => return self.begin_registration(user.chat_id, conn).await,
        };

        if profile.credits < 1 {
            drop(conn);
            self.dialogues.clear(user.chat_id).await;
            return Ok(Outcome::reply(NO_CREDITS, Keyboard::MeetButton));
        }

        let missing_attribute = match category {
            Category::Collab => profile.creativity.is_none(),
            Category::Love => profile.gender.is_none(),
            Category::Friendship => false,
        };
        drop(conn);
        if missing_attribute {
            return self
                .redirect_to_attribute_collection(user.chat_id, category)
                .await;
        }

        self.dialogues.clear(user.chat_id).await;
        self.run_match(user, category).await
    }

    /// Переводит участника на шаг сбора атрибута, без которого подбор
    /// в этой категории невозможен.
    async fn redirect_to_attribute_collection(
        &self,
        chat_id: i64,
        category: Category,
    ) -> AppResult<Outcome> {
        match ConversationState::meet_attribute_step(category) {
            Some(step @ ConversationState::AwaitingMeetCreativity) => {
                self.dialogues.set(chat_id, step).await;
                Ok(Outcome::reply(CREATIVITY_PROMPT, Keyboard::Remove))
            }
            Some(step @ ConversationState::AwaitingMeetGender) => {
                self.dialogues.set(chat_id, step).await;
                Ok(Outcome::reply(GENDER_PROMPT, Keyboard::Genders))
            }
            _ => Ok(Outcome::default()),
        }
    }

    /// Сохраняет творчество, введённое перед подбором, и запускает подбор.
    async fn save_meet_creativity(&self, user: &UserRef, creativity: &str) -> AppResult<Outcome> {
        let conn = self.connection()?;
        db::set_creativity(&conn, user.chat_id, creativity)?;
        drop(conn);
        self.dialogues.clear(user.chat_id).await;

        let mut outcome = Outcome::reply(
            "✅ Творчество сохранено. Ищем партнёра...",
            Keyboard::MeetButton,
        );
        outcome.extend(self.run_match(user, Category::Collab).await?);
        Ok(outcome)
    }

    /// Сохраняет пол, введённый перед подбором, и запускает подбор.
    async fn save_meet_gender(&self, user: &UserRef, gender: Gender) -> AppResult<Outcome> {
        let conn = self.connection()?;
        db::set_gender(&conn, user.chat_id, gender)?;
        drop(conn);
        self.dialogues.clear(user.chat_id).await;

        let mut outcome = Outcome::reply("✅ Пол сохранён. Ищем партнёра...", Keyboard::MeetButton);
        outcome.extend(self.run_match(user, Category::Love).await?);
        Ok(outcome)
    }

    /// Запускает движок подбора и переводит его исход в ответы.
    async fn run_match(&self, user: &UserRef, category: Category) -> AppResult<Outcome> {
        let mut conn = self.connection()?;
        match engine::request_match(&mut conn, user.chat_id, category)? {
            MatchOutcome::NotRegistered => self.begin_registration(user.chat_id, conn).await,
            MatchOutcome::OutOfCredits => Ok(Outcome::reply(NO_CREDITS, Keyboard::MeetButton)),
            MatchOutcome::MissingAttribute(missing) => {
                self.redirect_to_attribute_collection(user.chat_id, missing)
                    .await
            }
            MatchOutcome::NoCandidates => Ok(Outcome::reply(
                "Нет подходящих участников в этой категории.",
                Keyboard::MeetButton,
            )),
            MatchOutcome::AlreadyMetEveryone => Ok(Outcome::reply(
                "Нет новых участников (вы уже встречались со всеми).",
                Keyboard::MeetButton,
            )),
            MatchOutcome::Matched { initiator, partner } => {
                let mut outcome = Outcome::reply(partner_card(&partner, category), Keyboard::MeetButton);
                outcome.notice = Some(PartnerNotice {
                    chat_id: partner.chat_id,
                    text: initiator_card(&initiator),
                });
                Ok(outcome)
            }
        }
    }
}

/// Повторный запрос значения для текущего шага диалога.
fn reprompt_for(state: &ConversationState) -> Outcome {
    let reply = match state {
        ConversationState::AwaitingName => Reply::new(
            "❗ Пожалуйста, введите своё имя (минимум одно слово).",
            Keyboard::Remove,
        ),
        ConversationState::AwaitingBio { .. } => Reply::new(
            "❗ Пожалуйста, напишите о себе хотя бы двумя словами.",
            Keyboard::Remove,
        ),
        ConversationState::AwaitingCategory { .. } | ConversationState::AwaitingMeetCategory => {
            Reply::new(
                "❗ Неверный ввод, выберите категорию на клавиатуре.",
                Keyboard::Categories,
            )
        }
        ConversationState::AwaitingCreativity { .. }
        | ConversationState::AwaitingMeetCreativity => {
            Reply::new(CREATIVITY_EMPTY, Keyboard::Remove)
        }
        ConversationState::AwaitingGender { .. } | ConversationState::AwaitingMeetGender => {
            Reply::new(GENDER_INVALID, Keyboard::Genders)
        }
    };
    Outcome::from(reply)
}

/// Карточка подобранного партнёра для инициатора.
fn partner_card(partner: &Profile, category: Category) -> String {
    let mut card = format!(
        "🎉 Ваша встреча:\n\nИмя: {}\nО себе: {}\nКонтакт: {}",
        partner.name,
        partner.bio,
        partner.contact_display()
    );
    if category == Category::Collab {
        if let Some(ref creativity) = partner.creativity {
            card.push_str(&format!("\nТворчество: {creativity}"));
        }
    }
    if category == Category::Love {
        if let Some(gender) = partner.gender {
            card.push_str(&format!("\nПол: {}", gender.display_ru()));
        }
    }
    card
}

/// Карточка инициатора для уведомления партнёра. Дополнительные строки
/// зависят от категории, указанной в профиле инициатора.
fn initiator_card(initiator: &Profile) -> String {
    let mut card = format!(
        "🎉 У вас новый матч!\n\nИмя: {}\nО себе: {}\nКонтакт: {}",
        initiator.name,
        initiator.bio,
        initiator.contact_display()
    );
    if initiator.category == Category::Collab {
        if let Some(ref creativity) = initiator.creativity {
            card.push_str(&format!("\nТворчество: {creativity}"));
        }
    }
    if initiator.category == Category::Love {
        if let Some(gender) = initiator.gender {
            card.push_str(&format!("\nПол: {}", gender.display_ru()));
        }
    }
    card
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(category: Category) -> Profile {
        Profile {
            chat_id: 10,
            name: "Оля".to_string(),
            bio: "Люблю кофе".to_string(),
            contact: None,
            category,
            credits: 1,
            creativity: Some("пишу картины".to_string()),
            gender: Some(Gender::Female),
        }
    }

    #[test]
    fn partner_card_shows_capitalized_gender_for_love() {
        let card = partner_card(&profile(Category::Love), Category::Love);
        assert!(card.contains("Пол: Женский"));
        assert!(!card.contains("Творчество:"));
        assert!(card.contains("Контакт: (не указан)"));
    }

    #[test]
    fn partner_card_shows_creativity_for_collab() {
        let card = partner_card(&profile(Category::Collab), Category::Collab);
        assert!(card.contains("Творчество: пишу картины"));
        assert!(!card.contains("Пол:"));
    }

    #[test]
    fn friendship_card_has_no_extra_lines() {
        let card = partner_card(&profile(Category::Friendship), Category::Friendship);
        assert!(!card.contains("Творчество:"));
        assert!(!card.contains("Пол:"));
    }

    #[test]
    fn initiator_card_follows_initiator_category() {
        let card = initiator_card(&profile(Category::Collab));
        assert!(card.contains("У вас новый матч"));
        assert!(card.contains("Творчество: пишу картины"));
    }

    #[test]
    fn reprompt_matches_step() {
        let outcome = reprompt_for(&ConversationState::AwaitingName);
        assert_eq!(outcome.replies.len(), 1);
        assert!(outcome.replies[0].text.contains("имя"));

        let outcome = reprompt_for(&ConversationState::AwaitingMeetGender);
        assert_eq!(outcome.replies[0].keyboard, Keyboard::Genders);
    }
}
