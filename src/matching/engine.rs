//! Подбор пары и учёт встреч.
//!
//! Движок выбирает случайного кандидата той же категории (для «Отношений»
//! строго противоположного пола), исключая всех, с кем инициатор уже
//! встречался, и фиксирует результат одной транзакцией: списание встречи
//! плюс симметричная запись пары. Частично применённая транзакция невозможна:
//! либо все три записи, либо ни одной.

use rand::Rng;

use crate::core::error::AppResult;
use crate::core::types::{Category, Gender};
use crate::storage::db::{self, DbConnection, Profile};

/// Результат запроса на подбор пары.
///
/// Все «отказные» варианты возвращаются без каких-либо изменений в базе.
#[derive(Debug)]
pub enum MatchOutcome {
    /// Пара подобрана и зафиксирована; встреча списана с инициатора.
    /// `initiator.credits` уже отражает списание.
    Matched {
        initiator: Profile,
        partner: Profile,
    },
    /// Инициатор не зарегистрирован.
    NotRegistered,
    /// У инициатора не осталось встреч.
    OutOfCredits,
    /// Для выбранной категории не заполнен обязательный атрибут
    /// (творчество для «Сотворчества», пол для «Отношений»).
    MissingAttribute(Category),
    /// В категории вообще нет подходящих участников.
    NoCandidates,
    /// Участники есть, но со всеми инициатор уже встречался.
    AlreadyMetEveryone,
}

/// Подбирает пару для `initiator_id` в категории `category`.
///
/// Контроллер диалога обязан заранее провести участника через сбор
/// недостающих атрибутов, но предусловия перепроверяются здесь и
/// возвращаются как типизированные исходы, а не паника.
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных (нужно `&mut` для транзакции)
/// * `initiator_id` - Telegram chat ID инициатора
/// * `category` - Категория встречи
pub fn request_match(
    conn: &mut DbConnection,
    initiator_id: i64,
    category: Category,
) -> AppResult<MatchOutcome> {
    let mut initiator = match db::get_profile(conn, initiator_id)? {
        Some(profile) => profile,
        None => return Ok(MatchOutcome::NotRegistered),
    };

    if initiator.credits < 1 {
        return Ok(MatchOutcome::OutOfCredits);
    }

    let candidates = match category {
        Category::Love => {
            let own_gender: Gender = match initiator.gender {
                Some(gender) => gender,
                None => return Ok(MatchOutcome::MissingAttribute(Category::Love)),
            };
            db::love_candidates(conn, own_gender.opposite(), initiator_id)?
        }
        Category::Collab => {
            if initiator.creativity.is_none() {
                return Ok(MatchOutcome::MissingAttribute(Category::Collab));
            }
            db::profiles_in_category(conn, category, initiator_id)?
        }
        Category::Friendship => db::profiles_in_category(conn, category, initiator_id)?,
    };

    if candidates.is_empty() {
        return Ok(MatchOutcome::NoCandidates);
    }

    let met = db::met_partner_ids(conn, initiator_id)?;
    let mut fresh: Vec<Profile> = candidates
        .into_iter()
        .filter(|candidate| !met.contains(&candidate.chat_id))
        .collect();

    if fresh.is_empty() {
        return Ok(MatchOutcome::AlreadyMetEveryone);
    }

    // Равновероятный выбор; рейтинга и сортировки нет намеренно
    let pick = rand::thread_rng().gen_range(0..fresh.len());
    let partner = fresh.swap_remove(pick);

    let tx = conn.transaction()?;
    let debited = tx.execute(
        "UPDATE profiles SET credits = credits - 1 WHERE chat_id = ?1 AND credits >= 1",
        [initiator_id],
    )?;
    if debited == 0 {
        // Встречу успела списать параллельная операция
        return Ok(MatchOutcome::OutOfCredits);
    }
    db::record_pair_on(&tx, initiator_id, partner.chat_id)?;
    tx.commit()?;

    initiator.credits -= 1;
    log::info!(
        "Matched {} with {} in category {}",
        initiator_id,
        partner.chat_id,
        category.as_db()
    );

    Ok(MatchOutcome::Matched { initiator, partner })
}
