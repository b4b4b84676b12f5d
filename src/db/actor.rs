use crate::db::models::{
    DbFlashcard, DbNote, DbQuiz, DbRoundup, DbScheduler, DbUser, RoundupSummary, SchedulerStatus,
};
use crate::db::patch::{DbPatchable, FlashcardPatch, RecordPatch, SchedulerCreate, SchedulerPatch};
use crate::db::schema::SQLITE_INIT;
use crate::error::OpenEduError;
use chrono::Utc;
use openedu_schema::{FlashcardDraft, QuizQuestion};
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{fmt::Display, str::FromStr, time::Duration};
use tracing::{debug, info};

type Reply<T> = RpcReplyPort<Result<T, OpenEduError>>;

#[derive(Debug)]
pub enum DbActorMessage {
    /// Insert a user keyed by wallet address (or return the existing row).
    UpsertUserByAddress(String, i64, Reply<DbUser>),

    /// Insert a user keyed by Telegram chat id (or return the existing row).
    UpsertUserByChat(i64, i64, Reply<DbUser>),

    /// Attach a wallet address to a user; `Conflict` when another user owns it.
    LinkAddress(i64, String, Reply<DbUser>),

    GetUser(i64, Reply<DbUser>),
    GetUserByAddress(String, Reply<DbUser>),

    /// Atomically subtract credits; fails without side effects when the balance is too low.
    SpendCredits(i64, i64, Reply<DbUser>),
    AddCredits(i64, i64, Reply<DbUser>),
    AddXp(i64, i64, Reply<DbUser>),

    CreateNote(i64, String, Reply<DbNote>),
    GetNote(i64, Reply<DbNote>),
    ListNotes(i64, Reply<Vec<DbNote>>),

    CreateQuiz(i64, Vec<QuizQuestion>, Reply<DbQuiz>),
    GetQuizByPublicId(String, Reply<DbQuiz>),
    ListQuizzes(i64, Reply<Vec<DbQuiz>>),

    CreateFlashcards(i64, Vec<FlashcardDraft>, Reply<Vec<DbFlashcard>>),
    GetFlashcard(i64, Reply<DbFlashcard>),
    ListFlashcards(i64, Reply<Vec<DbFlashcard>>),

    /// Insert a scheduler row, or overwrite the user's active one.
    UpsertScheduler(SchedulerCreate, Reply<DbScheduler>),
    GetScheduler(i64, Reply<DbScheduler>),
    ListActiveSchedulers(Reply<Vec<DbScheduler>>),
    ListSchedulers(i64, Reply<Vec<DbScheduler>>),

    /// Cancel every active scheduler of a user; returns the cancelled ids.
    CancelSchedulersForUser(i64, Reply<Vec<i64>>),

    /// Patch a scheduler or flashcard record by id.
    Patch(RecordPatch, Reply<()>),

    RecordRoundup(i64, i64, i64, Reply<DbRoundup>),
    RoundupSummary(i64, Reply<RoundupSummary>),
}

fn rpc_failed(name: &str, e: impl Display) -> OpenEduError {
    OpenEduError::RactorError(format!("DbActor {name} RPC failed: {e}"))
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

impl DbActorHandle {
    pub async fn upsert_user_by_address(
        &self,
        address: String,
        starting_credits: i64,
    ) -> Result<DbUser, OpenEduError> {
        ractor::call!(
            self.actor,
            DbActorMessage::UpsertUserByAddress,
            address,
            starting_credits
        )
        .map_err(|e| rpc_failed("UpsertUserByAddress", e))?
    }

    pub async fn upsert_user_by_chat(
        &self,
        chat_id: i64,
        starting_credits: i64,
    ) -> Result<DbUser, OpenEduError> {
        ractor::call!(
            self.actor,
            DbActorMessage::UpsertUserByChat,
            chat_id,
            starting_credits
        )
        .map_err(|e| rpc_failed("UpsertUserByChat", e))?
    }

    pub async fn link_address(&self, user_id: i64, address: String) -> Result<DbUser, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::LinkAddress, user_id, address)
            .map_err(|e| rpc_failed("LinkAddress", e))?
    }

    pub async fn get_user(&self, id: i64) -> Result<DbUser, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::GetUser, id)
            .map_err(|e| rpc_failed("GetUser", e))?
    }

    pub async fn get_user_by_address(&self, address: String) -> Result<DbUser, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::GetUserByAddress, address)
            .map_err(|e| rpc_failed("GetUserByAddress", e))?
    }

    pub async fn spend_credits(&self, user_id: i64, amount: i64) -> Result<DbUser, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::SpendCredits, user_id, amount)
            .map_err(|e| rpc_failed("SpendCredits", e))?
    }

    pub async fn add_credits(&self, user_id: i64, amount: i64) -> Result<DbUser, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::AddCredits, user_id, amount)
            .map_err(|e| rpc_failed("AddCredits", e))?
    }

    pub async fn add_xp(&self, user_id: i64, amount: i64) -> Result<DbUser, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::AddXp, user_id, amount)
            .map_err(|e| rpc_failed("AddXp", e))?
    }

    pub async fn create_note(&self, user_id: i64, content: String) -> Result<DbNote, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::CreateNote, user_id, content)
            .map_err(|e| rpc_failed("CreateNote", e))?
    }

    pub async fn get_note(&self, id: i64) -> Result<DbNote, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::GetNote, id)
            .map_err(|e| rpc_failed("GetNote", e))?
    }

    pub async fn list_notes(&self, user_id: i64) -> Result<Vec<DbNote>, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::ListNotes, user_id)
            .map_err(|e| rpc_failed("ListNotes", e))?
    }

    pub async fn create_quiz(
        &self,
        note_id: i64,
        questions: Vec<QuizQuestion>,
    ) -> Result<DbQuiz, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::CreateQuiz, note_id, questions)
            .map_err(|e| rpc_failed("CreateQuiz", e))?
    }

    pub async fn get_quiz_by_public_id(&self, public_id: String) -> Result<DbQuiz, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::GetQuizByPublicId, public_id)
            .map_err(|e| rpc_failed("GetQuizByPublicId", e))?
    }

    pub async fn list_quizzes(&self, note_id: i64) -> Result<Vec<DbQuiz>, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::ListQuizzes, note_id)
            .map_err(|e| rpc_failed("ListQuizzes", e))?
    }

    pub async fn create_flashcards(
        &self,
        note_id: i64,
        drafts: Vec<FlashcardDraft>,
    ) -> Result<Vec<DbFlashcard>, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::CreateFlashcards, note_id, drafts)
            .map_err(|e| rpc_failed("CreateFlashcards", e))?
    }

    pub async fn get_flashcard(&self, id: i64) -> Result<DbFlashcard, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::GetFlashcard, id)
            .map_err(|e| rpc_failed("GetFlashcard", e))?
    }

    pub async fn list_flashcards(&self, note_id: i64) -> Result<Vec<DbFlashcard>, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::ListFlashcards, note_id)
            .map_err(|e| rpc_failed("ListFlashcards", e))?
    }

    pub async fn upsert_scheduler(
        &self,
        create: SchedulerCreate,
    ) -> Result<DbScheduler, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::UpsertScheduler, create)
            .map_err(|e| rpc_failed("UpsertScheduler", e))?
    }

    pub async fn get_scheduler(&self, id: i64) -> Result<DbScheduler, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::GetScheduler, id)
            .map_err(|e| rpc_failed("GetScheduler", e))?
    }

    pub async fn list_active_schedulers(&self) -> Result<Vec<DbScheduler>, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::ListActiveSchedulers)
            .map_err(|e| rpc_failed("ListActiveSchedulers", e))?
    }

    pub async fn list_schedulers(&self, user_id: i64) -> Result<Vec<DbScheduler>, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::ListSchedulers, user_id)
            .map_err(|e| rpc_failed("ListSchedulers", e))?
    }

    pub async fn cancel_schedulers_for_user(&self, user_id: i64) -> Result<Vec<i64>, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::CancelSchedulersForUser, user_id)
            .map_err(|e| rpc_failed("CancelSchedulersForUser", e))?
    }

    pub async fn patch(&self, patch: RecordPatch) -> Result<(), OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::Patch, patch)
            .map_err(|e| rpc_failed("Patch", e))?
    }

    pub async fn patch_scheduler(&self, id: i64, patch: SchedulerPatch) -> Result<(), OpenEduError> {
        self.patch(RecordPatch::Scheduler { id, patch }).await
    }

    pub async fn patch_flashcard(&self, id: i64, patch: FlashcardPatch) -> Result<(), OpenEduError> {
        self.patch(RecordPatch::Flashcard { id, patch }).await
    }

    pub async fn record_roundup(
        &self,
        user_id: i64,
        total_cents: i64,
        deposit_cents: i64,
    ) -> Result<DbRoundup, OpenEduError> {
        ractor::call!(
            self.actor,
            DbActorMessage::RecordRoundup,
            user_id,
            total_cents,
            deposit_cents
        )
        .map_err(|e| rpc_failed("RecordRoundup", e))?
    }

    pub async fn roundup_summary(&self, user_id: i64) -> Result<RoundupSummary, OpenEduError> {
        ractor::call!(self.actor, DbActorMessage::RoundupSummary, user_id)
            .map_err(|e| rpc_failed("RoundupSummary", e))?
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let pool = &state.pool;
        match message {
            DbActorMessage::UpsertUserByAddress(address, credits, reply) => {
                let _ = reply.send(self.upsert_user_by_address(pool, address, credits).await);
            }
            DbActorMessage::UpsertUserByChat(chat_id, credits, reply) => {
                let _ = reply.send(self.upsert_user_by_chat(pool, chat_id, credits).await);
            }
            DbActorMessage::LinkAddress(user_id, address, reply) => {
                let _ = reply.send(self.link_address(pool, user_id, address).await);
            }
            DbActorMessage::GetUser(id, reply) => {
                let _ = reply.send(self.get_user(pool, id).await);
            }
            DbActorMessage::GetUserByAddress(address, reply) => {
                let _ = reply.send(self.get_user_by_address(pool, &address).await);
            }
            DbActorMessage::SpendCredits(user_id, amount, reply) => {
                let _ = reply.send(self.spend_credits(pool, user_id, amount).await);
            }
            DbActorMessage::AddCredits(user_id, amount, reply) => {
                let _ = reply.send(self.add_to_column(pool, "credits", user_id, amount).await);
            }
            DbActorMessage::AddXp(user_id, amount, reply) => {
                let _ = reply.send(self.add_to_column(pool, "xp", user_id, amount).await);
            }
            DbActorMessage::CreateNote(user_id, content, reply) => {
                let _ = reply.send(self.create_note(pool, user_id, content).await);
            }
            DbActorMessage::GetNote(id, reply) => {
                let _ = reply.send(self.get_note(pool, id).await);
            }
            DbActorMessage::ListNotes(user_id, reply) => {
                let _ = reply.send(self.list_notes(pool, user_id).await);
            }
            DbActorMessage::CreateQuiz(note_id, questions, reply) => {
                let _ = reply.send(self.create_quiz(pool, note_id, questions).await);
            }
            DbActorMessage::GetQuizByPublicId(public_id, reply) => {
                let _ = reply.send(self.get_quiz_by_public_id(pool, &public_id).await);
            }
            DbActorMessage::ListQuizzes(note_id, reply) => {
                let _ = reply.send(self.list_quizzes(pool, note_id).await);
            }
            DbActorMessage::CreateFlashcards(note_id, drafts, reply) => {
                let _ = reply.send(self.create_flashcards(pool, note_id, drafts).await);
            }
            DbActorMessage::GetFlashcard(id, reply) => {
                let _ = reply.send(self.get_flashcard(pool, id).await);
            }
            DbActorMessage::ListFlashcards(note_id, reply) => {
                let _ = reply.send(self.list_flashcards(pool, note_id).await);
            }
            DbActorMessage::UpsertScheduler(create, reply) => {
                let _ = reply.send(self.upsert_scheduler(pool, create).await);
            }
            DbActorMessage::GetScheduler(id, reply) => {
                let _ = reply.send(self.get_scheduler(pool, id).await);
            }
            DbActorMessage::ListActiveSchedulers(reply) => {
                let _ = reply.send(self.list_active_schedulers(pool).await);
            }
            DbActorMessage::ListSchedulers(user_id, reply) => {
                let _ = reply.send(self.list_schedulers(pool, user_id).await);
            }
            DbActorMessage::CancelSchedulersForUser(user_id, reply) => {
                let _ = reply.send(self.cancel_schedulers_for_user(pool, user_id).await);
            }
            DbActorMessage::Patch(patch, reply) => {
                let _ = reply.send(patch.apply_patch(pool).await);
            }
            DbActorMessage::RecordRoundup(user_id, total_cents, deposit_cents, reply) => {
                let _ = reply.send(
                    self.record_roundup(pool, user_id, total_cents, deposit_cents)
                        .await,
                );
            }
            DbActorMessage::RoundupSummary(user_id, reply) => {
                let _ = reply.send(self.roundup_summary(pool, user_id).await);
            }
        }
        Ok(())
    }
}

impl DbActor {
    async fn upsert_user_by_address(
        &self,
        pool: &SqlitePool,
        address: String,
        starting_credits: i64,
    ) -> Result<DbUser, OpenEduError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, DbUser>(
            r#"
            INSERT INTO users (address, credits, xp, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            ON CONFLICT(address) DO UPDATE SET updated_at = excluded.updated_at
            RETURNING id, address, telegram_chat_id, credits, xp, created_at, updated_at
            "#,
        )
        .bind(address)
        .bind(starting_credits)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    async fn upsert_user_by_chat(
        &self,
        pool: &SqlitePool,
        chat_id: i64,
        starting_credits: i64,
    ) -> Result<DbUser, OpenEduError> {
        let now = Utc::now();
        let user = sqlx::query_as::<_, DbUser>(
            r#"
            INSERT INTO users (telegram_chat_id, credits, xp, created_at, updated_at)
            VALUES (?, ?, 0, ?, ?)
            ON CONFLICT(telegram_chat_id) DO UPDATE SET updated_at = excluded.updated_at
            RETURNING id, address, telegram_chat_id, credits, xp, created_at, updated_at
            "#,
        )
        .bind(chat_id)
        .bind(starting_credits)
        .bind(now)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    async fn link_address(
        &self,
        pool: &SqlitePool,
        user_id: i64,
        address: String,
    ) -> Result<DbUser, OpenEduError> {
        let owner: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE address = ?")
            .bind(&address)
            .fetch_optional(pool)
            .await?;

        match owner {
            Some(id) if id == user_id => return self.get_user(pool, user_id).await,
            Some(_) => {
                return Err(OpenEduError::Conflict(format!(
                    "address {address} belongs to another user"
                )));
            }
            None => {}
        }

        let linked = sqlx::query_as::<_, DbUser>(
            r#"
            UPDATE users SET address = ?, updated_at = ?
            WHERE id = ?
            RETURNING id, address, telegram_chat_id, credits, xp, created_at, updated_at
            "#,
        )
        .bind(&address)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                OpenEduError::Conflict(format!("address {address} belongs to another user"))
            }
            other => OpenEduError::DatabaseError(other),
        })?
        .ok_or_else(|| OpenEduError::NotFound(format!("user {user_id}")))?;

        debug!(user_id, address = %address, "address linked");
        Ok(linked)
    }

    async fn get_user(&self, pool: &SqlitePool, id: i64) -> Result<DbUser, OpenEduError> {
        sqlx::query_as::<_, DbUser>(
            r#"
            SELECT id, address, telegram_chat_id, credits, xp, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| OpenEduError::NotFound(format!("user {id}")))
    }

    async fn get_user_by_address(
        &self,
        pool: &SqlitePool,
        address: &str,
    ) -> Result<DbUser, OpenEduError> {
        sqlx::query_as::<_, DbUser>(
            r#"
            SELECT id, address, telegram_chat_id, credits, xp, created_at, updated_at
            FROM users
            WHERE address = ?
            "#,
        )
        .bind(address)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| OpenEduError::NotFound(format!("user {address}")))
    }

    async fn spend_credits(
        &self,
        pool: &SqlitePool,
        user_id: i64,
        amount: i64,
    ) -> Result<DbUser, OpenEduError> {
        if amount < 0 {
            return Err(OpenEduError::InvalidInput(
                "credit amount must be non-negative".to_string(),
            ));
        }

        let updated = sqlx::query_as::<_, DbUser>(
            r#"
            UPDATE users SET credits = credits - ?, updated_at = ?
            WHERE id = ? AND credits >= ?
            RETURNING id, address, telegram_chat_id, credits, xp, created_at, updated_at
            "#,
        )
        .bind(amount)
        .bind(Utc::now())
        .bind(user_id)
        .bind(amount)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(user) => Ok(user),
            None => {
                let user = self.get_user(pool, user_id).await?;
                Err(OpenEduError::InsufficientCredits {
                    required: amount,
                    available: user.credits,
                })
            }
        }
    }

    async fn add_to_column(
        &self,
        pool: &SqlitePool,
        column: &'static str,
        user_id: i64,
        amount: i64,
    ) -> Result<DbUser, OpenEduError> {
        sqlx::query_as::<_, DbUser>(&format!(
            r#"
            UPDATE users SET {column} = {column} + ?, updated_at = ?
            WHERE id = ?
            RETURNING id, address, telegram_chat_id, credits, xp, created_at, updated_at
            "#
        ))
        .bind(amount)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| OpenEduError::NotFound(format!("user {user_id}")))
    }

    async fn create_note(
        &self,
        pool: &SqlitePool,
        user_id: i64,
        content: String,
    ) -> Result<DbNote, OpenEduError> {
        let note = sqlx::query_as::<_, DbNote>(
            r#"
            INSERT INTO notes (user_id, content, created_at)
            VALUES (?, ?, ?)
            RETURNING id, user_id, content, created_at
            "#,
        )
        .bind(user_id)
        .bind(content)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(note)
    }

    async fn get_note(&self, pool: &SqlitePool, id: i64) -> Result<DbNote, OpenEduError> {
        sqlx::query_as::<_, DbNote>(
            r#"
            SELECT id, user_id, content, created_at
            FROM notes
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| OpenEduError::NotFound(format!("note {id}")))
    }

    async fn list_notes(&self, pool: &SqlitePool, user_id: i64) -> Result<Vec<DbNote>, OpenEduError> {
        let rows = sqlx::query_as::<_, DbNote>(
            r#"
            SELECT id, user_id, content, created_at
            FROM notes
            WHERE user_id = ?
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn create_quiz(
        &self,
        pool: &SqlitePool,
        note_id: i64,
        questions: Vec<QuizQuestion>,
    ) -> Result<DbQuiz, OpenEduError> {
        let public_id = uuid::Uuid::new_v4().to_string();
        let questions = serde_json::to_string(&questions)?;

        let quiz = sqlx::query_as::<_, DbQuiz>(
            r#"
            INSERT INTO quizzes (public_id, note_id, questions, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, public_id, note_id, questions, created_at
            "#,
        )
        .bind(public_id)
        .bind(note_id)
        .bind(questions)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(quiz)
    }

    async fn get_quiz_by_public_id(
        &self,
        pool: &SqlitePool,
        public_id: &str,
    ) -> Result<DbQuiz, OpenEduError> {
        sqlx::query_as::<_, DbQuiz>(
            r#"
            SELECT id, public_id, note_id, questions, created_at
            FROM quizzes
            WHERE public_id = ?
            "#,
        )
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| OpenEduError::NotFound(format!("quiz {public_id}")))
    }

    async fn list_quizzes(&self, pool: &SqlitePool, note_id: i64) -> Result<Vec<DbQuiz>, OpenEduError> {
        let rows = sqlx::query_as::<_, DbQuiz>(
            r#"
            SELECT id, public_id, note_id, questions, created_at
            FROM quizzes
            WHERE note_id = ?
            ORDER BY id
            "#,
        )
        .bind(note_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn create_flashcards(
        &self,
        pool: &SqlitePool,
        note_id: i64,
        drafts: Vec<FlashcardDraft>,
    ) -> Result<Vec<DbFlashcard>, OpenEduError> {
        let mut tx = pool.begin().await?;
        let now = Utc::now();
        let mut cards = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let card = sqlx::query_as::<_, DbFlashcard>(
                r#"
                INSERT INTO flashcards (note_id, front, back, created_at)
                VALUES (?, ?, ?, ?)
                RETURNING id, note_id, front, back, ease_factor, interval_days, repetitions, due_at, created_at
                "#,
            )
            .bind(note_id)
            .bind(draft.front)
            .bind(draft.back)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            cards.push(card);
        }

        tx.commit().await?;
        Ok(cards)
    }

    async fn get_flashcard(&self, pool: &SqlitePool, id: i64) -> Result<DbFlashcard, OpenEduError> {
        sqlx::query_as::<_, DbFlashcard>(
            r#"
            SELECT id, note_id, front, back, ease_factor, interval_days, repetitions, due_at, created_at
            FROM flashcards
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| OpenEduError::NotFound(format!("flashcard {id}")))
    }

    async fn list_flashcards(
        &self,
        pool: &SqlitePool,
        note_id: i64,
    ) -> Result<Vec<DbFlashcard>, OpenEduError> {
        let rows = sqlx::query_as::<_, DbFlashcard>(
            r#"
            SELECT id, note_id, front, back, ease_factor, interval_days, repetitions, due_at, created_at
            FROM flashcards
            WHERE note_id = ?
            ORDER BY id
            "#,
        )
        .bind(note_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn upsert_scheduler(
        &self,
        pool: &SqlitePool,
        create: SchedulerCreate,
    ) -> Result<DbScheduler, OpenEduError> {
        let mut tx = pool.begin().await?;
        let now = Utc::now();
        let breakdown = serde_json::to_string(&create.breakdown)?;

        let existing: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM schedulers
            WHERE user_id = ? AND status = 'active'
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(create.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match existing {
            Some(id) => {
                sqlx::query_as::<_, DbScheduler>(
                    r#"
                    UPDATE schedulers
                    SET chat_id = ?, day = 0, total_days = ?, content = ?, breakdown = ?,
                        revision = revision + 1, next_run_at = ?, updated_at = ?
                    WHERE id = ?
                    RETURNING id, user_id, chat_id, day, total_days, content, breakdown, status,
                              revision, next_run_at, created_at, updated_at
                    "#,
                )
                .bind(create.chat_id)
                .bind(create.total_days)
                .bind(&create.content)
                .bind(&breakdown)
                .bind(create.next_run_at)
                .bind(now)
                .bind(id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, DbScheduler>(
                    r#"
                    INSERT INTO schedulers (
                        user_id, chat_id, day, total_days, content, breakdown, status,
                        next_run_at, created_at, updated_at
                    )
                    VALUES (?, ?, 0, ?, ?, ?, 'active', ?, ?, ?)
                    RETURNING id, user_id, chat_id, day, total_days, content, breakdown, status,
                              revision, next_run_at, created_at, updated_at
                    "#,
                )
                .bind(create.user_id)
                .bind(create.chat_id)
                .bind(create.total_days)
                .bind(&create.content)
                .bind(&breakdown)
                .bind(create.next_run_at)
                .bind(now)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        debug!(
            scheduler_id = row.id,
            user_id = row.user_id,
            replaced = existing.is_some(),
            total_days = row.total_days,
            "scheduler upserted"
        );
        Ok(row)
    }

    async fn get_scheduler(&self, pool: &SqlitePool, id: i64) -> Result<DbScheduler, OpenEduError> {
        sqlx::query_as::<_, DbScheduler>(
            r#"
            SELECT id, user_id, chat_id, day, total_days, content, breakdown, status,
                   revision, next_run_at, created_at, updated_at
            FROM schedulers
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| OpenEduError::NotFound(format!("scheduler {id}")))
    }

    async fn list_active_schedulers(
        &self,
        pool: &SqlitePool,
    ) -> Result<Vec<DbScheduler>, OpenEduError> {
        let rows = sqlx::query_as::<_, DbScheduler>(
            r#"
            SELECT id, user_id, chat_id, day, total_days, content, breakdown, status,
                   revision, next_run_at, created_at, updated_at
            FROM schedulers
            WHERE status = ?
            ORDER BY next_run_at, id
            "#,
        )
        .bind(SchedulerStatus::Active.as_str())
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn list_schedulers(
        &self,
        pool: &SqlitePool,
        user_id: i64,
    ) -> Result<Vec<DbScheduler>, OpenEduError> {
        let rows = sqlx::query_as::<_, DbScheduler>(
            r#"
            SELECT id, user_id, chat_id, day, total_days, content, breakdown, status,
                   revision, next_run_at, created_at, updated_at
            FROM schedulers
            WHERE user_id = ?
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(rows)
    }

    async fn cancel_schedulers_for_user(
        &self,
        pool: &SqlitePool,
        user_id: i64,
    ) -> Result<Vec<i64>, OpenEduError> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            UPDATE schedulers SET status = ?, revision = revision + 1, updated_at = ?
            WHERE user_id = ? AND status = ?
            RETURNING id
            "#,
        )
        .bind(SchedulerStatus::Cancelled.as_str())
        .bind(Utc::now())
        .bind(user_id)
        .bind(SchedulerStatus::Active.as_str())
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }

    async fn record_roundup(
        &self,
        pool: &SqlitePool,
        user_id: i64,
        total_cents: i64,
        deposit_cents: i64,
    ) -> Result<DbRoundup, OpenEduError> {
        let row = sqlx::query_as::<_, DbRoundup>(
            r#"
            INSERT INTO roundups (user_id, total_cents, deposit_cents, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, user_id, total_cents, deposit_cents, created_at
            "#,
        )
        .bind(user_id)
        .bind(total_cents)
        .bind(deposit_cents)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(row)
    }

    async fn roundup_summary(
        &self,
        pool: &SqlitePool,
        user_id: i64,
    ) -> Result<RoundupSummary, OpenEduError> {
        let (count, total_deposit_cents): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*), COALESCE(SUM(deposit_cents), 0)
            FROM roundups
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(RoundupSummary {
            count,
            total_deposit_cents,
        })
    }
}

/// Spawn the database actor and return a cloneable handle.
pub async fn spawn(database_url: &str) -> Result<DbActorHandle, OpenEduError> {
    // Unnamed: several stores may live in one process (tests, tools).
    let (actor, _jh) = ractor::Actor::spawn(None, DbActor, database_url.to_string())
        .await
        .map_err(|e| OpenEduError::RactorError(format!("failed to spawn DbActor: {e}")))?;

    Ok(DbActorHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), OpenEduError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
