use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Result;
use std::collections::HashSet;

use crate::core::config;
use crate::core::types::{Category, Gender};

/// Структура, представляющая профиль участника в базе данных.
#[derive(Debug, Clone)]
pub struct Profile {
    /// Telegram chat ID участника (отрицательные значения - служебные анкеты)
    pub chat_id: i64,
    /// Имя участника
    pub name: String,
    /// Короткий рассказ о себе
    pub bio: String,
    /// Контакт (@username), если участник его указал
    pub contact: Option<String>,
    /// Категория, которую ищет участник
    pub category: Category,
    /// Остаток встреч (никогда не уходит в минус)
    pub credits: i64,
    /// Описание творчества, обязательно для категории «Сотворчество»
    pub creativity: Option<String>,
    /// Пол, обязателен для категории «Отношения»
    pub gender: Option<Gender>,
}

impl Profile {
    /// Возвращает контакт для показа в карточке встречи.
    ///
    /// # Returns
    ///
    /// `@username` или «(не указан)», если контакт отсутствует.
    pub fn contact_display(&self) -> &str {
        match self.contact.as_deref() {
            Some(contact) if !contact.is_empty() => contact,
            _ => "(не указан)",
        }
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections, runs schema
/// migrations and seeds the placeholder candidate profiles. The checkout
/// timeout is bounded so callers get a "storage unavailable" error instead
/// of hanging when the database cannot be reached.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Returns
///
/// Returns a `DbPool` on success or an `r2d2::Error` if pool creation fails.
pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder()
        .max_size(config::db::MAX_CONNECTIONS)
        .connection_timeout(config::db::connection_timeout())
        .build(manager)?;

    // Ensure schema is up to date on first connection
    let conn = pool.get()?;
    if let Err(e) = migrate_schema(&conn) {
        log::warn!("Failed to migrate schema: {}", e);
        // Don't fail on migration errors, as they might be expected
    }
    if let Err(e) = seed_placeholder_profiles(&conn) {
        log::warn!("Failed to seed placeholder profiles: {}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// Retrieves a connection from the connection pool. The connection is automatically
/// returned to the pool when dropped.
///
/// # Arguments
///
/// * `pool` - Database connection pool
///
/// # Returns
///
/// Returns a `DbConnection` on success or an `r2d2::Error` if no connection
/// becomes available within the configured timeout.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Migrate database schema to ensure all required tables and columns exist
/// This function safely adds missing columns to existing tables
fn migrate_schema(conn: &rusqlite::Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS profiles (
            chat_id    INTEGER PRIMARY KEY,
            name       TEXT NOT NULL,
            bio        TEXT NOT NULL,
            contact    TEXT,
            category   TEXT NOT NULL,
            credits    INTEGER NOT NULL DEFAULT 0,
            creativity TEXT,
            gender     TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pairs (
            user_id    INTEGER NOT NULL,
            partner_id INTEGER NOT NULL,
            UNIQUE(user_id, partner_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS meeting_grants (
            chat_id     INTEGER NOT NULL,
            grant_token TEXT NOT NULL,
            UNIQUE(chat_id, grant_token)
        )",
        [],
    )?;

    // Older installs may predate the optional attribute columns
    let mut stmt = conn.prepare("PRAGMA table_info(profiles)")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;

    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }

    for (column, ddl) in [
        ("contact", "ALTER TABLE profiles ADD COLUMN contact TEXT"),
        ("creativity", "ALTER TABLE profiles ADD COLUMN creativity TEXT"),
        ("gender", "ALTER TABLE profiles ADD COLUMN gender TEXT"),
    ] {
        if !columns.contains(&column.to_string()) {
            log::info!("Adding missing column: {} to profiles table", column);
            if let Err(e) = conn.execute(ddl, []) {
                log::warn!("Failed to add {} column: {}", column, e);
            }
        }
    }

    Ok(())
}

/// Служебные анкеты с отрицательными ID: гарантируют, что первым
/// зарегистрировавшимся участникам всегда найдётся пара в любой категории.
/// Движок подбора обрабатывает их наравне с обычными профилями.
fn seed_placeholder_profiles(conn: &rusqlite::Connection) -> Result<()> {
    let seeds: &[(i64, &str, &str, &str, Category, Option<&str>, Option<Gender>)] = &[
        (-1, "Алиса", "Люблю гулять", "@alice_bot", Category::Friendship, None, None),
        (-2, "Борис", "Пишу стихи каждый день", "@boris_creative", Category::Collab, Some("пишу стихи каждый день"), None),
        (-3, "Вера", "Обожаю настолки", "@vera_games", Category::Friendship, None, None),
        (-4, "Глеб", "Снимаю короткие видео", "@gleb_films", Category::Collab, Some("снимаю короткие видео"), None),
        (-5, "Дмитрий", "Играю на гитаре", "@dima_guitar", Category::Love, None, Some(Gender::Male)),
        (-6, "Ева", "Рисую акварелью", "@eva_paints", Category::Love, None, Some(Gender::Female)),
    ];

    for (chat_id, name, bio, contact, category, creativity, gender) in seeds {
        conn.execute(
            "INSERT OR IGNORE INTO profiles (chat_id, name, bio, contact, category, credits, creativity, gender)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7)",
            rusqlite::params![
                chat_id,
                name,
                bio,
                contact,
                category.as_db(),
                creativity,
                gender.map(Gender::as_db),
            ],
        )?;
    }

    Ok(())
}

/// Собирает профиль из строки результата запроса.
fn profile_from_row(row: &rusqlite::Row<'_>) -> Result<Profile> {
    let category_raw: String = row.get(4)?;
    let category = Category::from_db(&category_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown category: {category_raw}").into(),
        )
    })?;

    let gender_raw: Option<String> = row.get(7)?;
    let gender = match gender_raw {
        Some(raw) => Some(Gender::from_db(&raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                7,
                rusqlite::types::Type::Text,
                format!("unknown gender: {raw}").into(),
            )
        })?),
        None => None,
    };

    Ok(Profile {
        chat_id: row.get(0)?,
        name: row.get(1)?,
        bio: row.get(2)?,
        contact: row.get(3)?,
        category,
        credits: row.get(5)?,
        creativity: row.get(6)?,
        gender,
    })
}

const PROFILE_COLUMNS: &str = "chat_id, name, bio, contact, category, credits, creativity, gender";

/// Получает профиль участника по chat ID.
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных
/// * `chat_id` - Telegram chat ID участника
///
/// # Returns
///
/// Возвращает `Ok(Some(Profile))` если профиль найден, `Ok(None)` если не найден,
/// или ошибку базы данных.
pub fn get_profile(conn: &DbConnection, chat_id: i64) -> Result<Option<Profile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE chat_id = ?1"
    ))?;
    let mut rows = stmt.query([chat_id])?;

    if let Some(row) = rows.next()? {
        Ok(Some(profile_from_row(row)?))
    } else {
        Ok(None)
    }
}

/// Сохраняет профиль целиком (полная замена по ключу).
///
/// Частичные изменения профиля делаются только явными мутаторами
/// ([`adjust_credits`], [`set_creativity`], [`set_gender`]).
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных
/// * `profile` - Профиль для сохранения
pub fn upsert_profile(conn: &DbConnection, profile: &Profile) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO profiles (chat_id, name, bio, contact, category, credits, creativity, gender)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            profile.chat_id,
            profile.name,
            profile.bio,
            profile.contact,
            profile.category.as_db(),
            profile.credits,
            profile.creativity,
            profile.gender.map(Gender::as_db),
        ],
    )?;
    Ok(())
}

/// Полностью удаляет данные участника: профиль, историю пар и
/// использованные гранты. Используется при повторной регистрации
/// и командой сброса: регистрация заново всегда разрушительна.
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных
/// * `chat_id` - Telegram chat ID участника
pub fn delete_all(conn: &DbConnection, chat_id: i64) -> Result<()> {
    conn.execute("DELETE FROM profiles WHERE chat_id = ?1", [chat_id])?;
    conn.execute(
        "DELETE FROM pairs WHERE user_id = ?1 OR partner_id = ?1",
        [chat_id],
    )?;
    conn.execute("DELETE FROM meeting_grants WHERE chat_id = ?1", [chat_id])?;
    Ok(())
}

/// Изменяет остаток встреч участника на `delta`.
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных
/// * `chat_id` - Telegram chat ID участника
/// * `delta` - Величина изменения (может быть отрицательной)
pub fn adjust_credits(conn: &DbConnection, chat_id: i64, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET credits = credits + ?1 WHERE chat_id = ?2",
        rusqlite::params![delta, chat_id],
    )?;
    Ok(())
}

/// Сохраняет описание творчества участника.
pub fn set_creativity(conn: &DbConnection, chat_id: i64, creativity: &str) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET creativity = ?1 WHERE chat_id = ?2",
        rusqlite::params![creativity, chat_id],
    )?;
    Ok(())
}

/// Сохраняет пол участника.
pub fn set_gender(conn: &DbConnection, chat_id: i64, gender: Gender) -> Result<()> {
    conn.execute(
        "UPDATE profiles SET gender = ?1 WHERE chat_id = ?2",
        rusqlite::params![gender.as_db(), chat_id],
    )?;
    Ok(())
}

/// Записывает пару в обе стороны. Повторная запись той же пары
/// молча игнорируется.
///
/// Принимает голое соединение, чтобы те же вставки можно было выполнять
/// внутри транзакции подбора.
pub(crate) fn record_pair_on(conn: &rusqlite::Connection, a: i64, b: i64) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO pairs (user_id, partner_id) VALUES (?1, ?2)",
        rusqlite::params![a, b],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO pairs (user_id, partner_id) VALUES (?1, ?2)",
        rusqlite::params![b, a],
    )?;
    Ok(())
}

/// Отмечает, что участники `a` и `b` уже встречались (симметрично, идемпотентно).
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных
/// * `a` - Первый участник
/// * `b` - Второй участник
pub fn record_pair(conn: &DbConnection, a: i64, b: i64) -> Result<()> {
    record_pair_on(conn, a, b)
}

/// Проверяет, встречались ли участники `a` и `b`.
///
/// # Returns
///
/// Возвращает `true`, если направленная запись `a -> b` существует.
pub fn has_met(conn: &DbConnection, a: i64, b: i64) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM pairs WHERE user_id = ?1 AND partner_id = ?2")?;
    let mut rows = stmt.query(rusqlite::params![a, b])?;
    Ok(rows.next()?.is_some())
}

/// Возвращает множество ID участников, с которыми `chat_id` уже встречался.
pub fn met_partner_ids(conn: &rusqlite::Connection, chat_id: i64) -> Result<HashSet<i64>> {
    let mut stmt = conn.prepare("SELECT partner_id FROM pairs WHERE user_id = ?1")?;
    let rows = stmt.query_map([chat_id], |row| row.get::<_, i64>(0))?;

    let mut ids = HashSet::new();
    for row in rows {
        ids.insert(row?);
    }
    Ok(ids)
}

/// Возвращает все профили заданной категории, кроме самого инициатора.
pub fn profiles_in_category(
    conn: &rusqlite::Connection,
    category: Category,
    exclude_chat_id: i64,
) -> Result<Vec<Profile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE category = ?1 AND chat_id <> ?2"
    ))?;
    let rows = stmt.query_map(
        rusqlite::params![category.as_db(), exclude_chat_id],
        profile_from_row,
    )?;

    let mut profiles = Vec::new();
    for row in rows {
        profiles.push(row?);
    }
    Ok(profiles)
}

/// Возвращает профили категории «Отношения» заданного пола, кроме инициатора.
pub fn love_candidates(
    conn: &rusqlite::Connection,
    gender: Gender,
    exclude_chat_id: i64,
) -> Result<Vec<Profile>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE category = ?1 AND gender = ?2 AND chat_id <> ?3"
    ))?;
    let rows = stmt.query_map(
        rusqlite::params![Category::Love.as_db(), gender.as_db(), exclude_chat_id],
        profile_from_row,
    )?;

    let mut profiles = Vec::new();
    for row in rows {
        profiles.push(row?);
    }
    Ok(profiles)
}

/// Зачисляет встречу по одноразовому гранту.
///
/// Вставка гранта и начисление встречи выполняются одной транзакцией,
/// повторное погашение той же пары `(chat_id, token)` ничего не меняет.
///
/// # Arguments
///
/// * `conn` - Соединение с базой данных
/// * `chat_id` - Telegram chat ID участника
/// * `token` - Одноразовый токен гранта
///
/// # Returns
///
/// Возвращает `Ok(true)`, если грант уже был погашен ранее, и `Ok(false)`,
/// если встреча зачислена этим вызовом.
pub fn redeem_grant(conn: &mut DbConnection, chat_id: i64, token: &str) -> Result<bool> {
    let tx = conn.transaction()?;

    let inserted = tx.execute(
        "INSERT OR IGNORE INTO meeting_grants (chat_id, grant_token) VALUES (?1, ?2)",
        rusqlite::params![chat_id, token],
    )?;

    if inserted == 0 {
        return Ok(true);
    }

    tx.execute(
        "UPDATE profiles SET credits = credits + 1 WHERE chat_id = ?1",
        [chat_id],
    )?;
    tx.commit()?;
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn test_pool() -> (DbPool, NamedTempFile) {
        let file = NamedTempFile::new().expect("temp db file");
        let pool = create_pool(file.path().to_str().expect("utf-8 path")).expect("pool");
        (pool, file)
    }

    fn sample_profile(chat_id: i64, category: Category) -> Profile {
        Profile {
            chat_id,
            name: "Тест".to_string(),
            bio: "Просто тест".to_string(),
            contact: Some("@test".to_string()),
            category,
            credits: 1,
            creativity: None,
            gender: None,
        }
    }

    #[test]
    fn upsert_and_get_round_trip() {
        let (pool, _file) = test_pool();
        let conn = get_connection(&pool).unwrap();

        let mut profile = sample_profile(100, Category::Collab);
        profile.creativity = Some("пишу музыку".to_string());
        upsert_profile(&conn, &profile).unwrap();

        let loaded = get_profile(&conn, 100).unwrap().expect("profile exists");
        assert_eq!(loaded.name, "Тест");
        assert_eq!(loaded.category, Category::Collab);
        assert_eq!(loaded.creativity.as_deref(), Some("пишу музыку"));
        assert_eq!(loaded.credits, 1);

        // Full-replace semantics: the stored row is overwritten wholesale
        profile.creativity = None;
        profile.credits = 3;
        upsert_profile(&conn, &profile).unwrap();
        let replaced = get_profile(&conn, 100).unwrap().unwrap();
        assert_eq!(replaced.creativity, None);
        assert_eq!(replaced.credits, 3);
    }

    #[test]
    fn missing_profile_is_none() {
        let (pool, _file) = test_pool();
        let conn = get_connection(&pool).unwrap();
        assert!(get_profile(&conn, 12345).unwrap().is_none());
    }

    #[test]
    fn record_pair_is_symmetric_and_idempotent() {
        let (pool, _file) = test_pool();
        let conn = get_connection(&pool).unwrap();

        record_pair(&conn, 1, 2).unwrap();
        assert!(has_met(&conn, 1, 2).unwrap());
        assert!(has_met(&conn, 2, 1).unwrap());

        // Re-recording must neither fail nor duplicate
        record_pair(&conn, 1, 2).unwrap();
        record_pair(&conn, 2, 1).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM pairs WHERE user_id IN (1, 2)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn delete_all_is_destructive() {
        let (pool, _file) = test_pool();
        let mut conn = get_connection(&pool).unwrap();

        upsert_profile(&conn, &sample_profile(7, Category::Friendship)).unwrap();
        record_pair(&conn, 7, -1).unwrap();
        redeem_grant(&mut conn, 7, "tok-1").unwrap();

        delete_all(&conn, 7).unwrap();

        assert!(get_profile(&conn, 7).unwrap().is_none());
        assert!(!has_met(&conn, 7, -1).unwrap());
        assert!(!has_met(&conn, -1, 7).unwrap());
        let grants: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM meeting_grants WHERE chat_id = 7",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(grants, 0);

        // After the wipe the grant token can be redeemed again
        assert!(!redeem_grant(&mut conn, 7, "tok-1").unwrap());
    }

    #[test]
    fn redeem_grant_is_idempotent() {
        let (pool, _file) = test_pool();
        let mut conn = get_connection(&pool).unwrap();

        upsert_profile(&conn, &sample_profile(8, Category::Friendship)).unwrap();

        assert!(!redeem_grant(&mut conn, 8, "promo").unwrap());
        assert!(redeem_grant(&mut conn, 8, "promo").unwrap());
        assert!(redeem_grant(&mut conn, 8, "promo").unwrap());

        let profile = get_profile(&conn, 8).unwrap().unwrap();
        assert_eq!(profile.credits, 2); // 1 initial + exactly 1 from the grant
    }

    #[test]
    fn adjust_credits_moves_balance() {
        let (pool, _file) = test_pool();
        let conn = get_connection(&pool).unwrap();

        upsert_profile(&conn, &sample_profile(9, Category::Friendship)).unwrap();
        adjust_credits(&conn, 9, 5).unwrap();
        assert_eq!(get_profile(&conn, 9).unwrap().unwrap().credits, 6);
    }

    #[test]
    fn placeholder_profiles_cover_every_category() {
        let (pool, _file) = test_pool();
        let conn = get_connection(&pool).unwrap();

        for category in [Category::Friendship, Category::Collab, Category::Love] {
            let candidates = profiles_in_category(&conn, category, 0).unwrap();
            assert!(
                candidates.iter().any(|p| p.chat_id < 0),
                "no placeholder for {:?}",
                category
            );
        }
        for gender in [Gender::Male, Gender::Female] {
            assert!(!love_candidates(&conn, gender, 0).unwrap().is_empty());
        }
    }

    #[test]
    fn seeding_is_idempotent() {
        let (pool, _file) = test_pool();
        let conn = get_connection(&pool).unwrap();

        seed_placeholder_profiles(&conn).unwrap();
        seed_placeholder_profiles(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM profiles WHERE chat_id < 0", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 6);
    }
}
