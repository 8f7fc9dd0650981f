use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Create every table the service needs (idempotent — safe to call on every
/// startup). All clinical tables carry a camp_id column: one shared schema,
/// row-scoped tenancy, because the chat-link lookup must cross camps.
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::raw_sql(
        r#"CREATE TABLE IF NOT EXISTS camps (
            id             UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            slug           VARCHAR(63) UNIQUE NOT NULL,
            name           VARCHAR(255) NOT NULL,
            starts_at      TIMESTAMPTZ NOT NULL,
            ends_at        TIMESTAMPTZ NOT NULL,
            venue          TEXT,
            contact_phone  VARCHAR(32),
            hospital_name  VARCHAR(255),
            created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    )
    .execute(pool)
    .await?;

    // camp_id NULL exactly for admins; staff always belong to one camp.
    sqlx::raw_sql(
        r#"CREATE TABLE IF NOT EXISTS users (
            id             UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            camp_id        UUID REFERENCES camps(id),
            email          VARCHAR(255) UNIQUE NOT NULL,
            password_hash  TEXT NOT NULL,
            full_name      VARCHAR(255) NOT NULL,
            role           VARCHAR(16) NOT NULL,
            is_active      BOOLEAN NOT NULL DEFAULT TRUE,
            created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT users_admin_has_no_camp
                CHECK ((role = 'admin') = (camp_id IS NULL))
        )"#,
    )
    .execute(pool)
    .await?;

    // Serialized per-camp sequence allocation: the upsert-increment on this
    // table is the atomic counter that keeps patient ids unique under
    // concurrent registration.
    sqlx::raw_sql(
        r#"CREATE TABLE IF NOT EXISTS camp_counters (
            camp_id   UUID PRIMARY KEY REFERENCES camps(id),
            last_seq  BIGINT NOT NULL DEFAULT 0
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::raw_sql(
        r#"CREATE TABLE IF NOT EXISTS visitors (
            id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            camp_id     UUID NOT NULL REFERENCES camps(id),
            patient_id  VARCHAR(80) NOT NULL,
            full_name   VARCHAR(255) NOT NULL,
            phone       VARCHAR(32) NOT NULL,
            age         INTEGER,
            gender      VARCHAR(16),
            address     TEXT,
            chat_id     VARCHAR(64),
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT visitors_patient_id_per_camp UNIQUE (camp_id, patient_id)
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::raw_sql(
        r#"CREATE TABLE IF NOT EXISTS visits (
            id               UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            camp_id          UUID NOT NULL REFERENCES camps(id),
            visitor_id       UUID NOT NULL REFERENCES visitors(id),
            doctor_id        UUID REFERENCES users(id),
            status           VARCHAR(16) NOT NULL DEFAULT 'registered',
            consultation_at  TIMESTAMPTZ,
            created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::raw_sql(
        r#"CREATE TABLE IF NOT EXISTS consultations (
            id             UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            visit_id       UUID UNIQUE NOT NULL REFERENCES visits(id),
            symptoms       TEXT NOT NULL,
            diagnosis      TEXT NOT NULL,
            notes          TEXT,
            prescriptions  JSONB NOT NULL DEFAULT '[]',
            follow_up      TEXT,
            created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::raw_sql(
        r#"CREATE TABLE IF NOT EXISTS attachments (
            id               UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            camp_id          UUID NOT NULL REFERENCES camps(id),
            visit_id         UUID NOT NULL REFERENCES visits(id),
            consultation_id  UUID REFERENCES consultations(id),
            kind             VARCHAR(16) NOT NULL,
            file_url         TEXT NOT NULL,
            file_name        VARCHAR(255) NOT NULL,
            mime_type        VARCHAR(128) NOT NULL,
            size_bytes       BIGINT NOT NULL,
            created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::raw_sql(
        r#"CREATE TABLE IF NOT EXISTS notification_log (
            id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            camp_id     UUID NOT NULL REFERENCES camps(id),
            visitor_id  UUID NOT NULL REFERENCES visitors(id),
            kind        VARCHAR(32) NOT NULL,
            body        TEXT NOT NULL,
            status      VARCHAR(16) NOT NULL DEFAULT 'pending',
            detail      TEXT,
            sent_at     TIMESTAMPTZ,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::raw_sql(
        "CREATE INDEX IF NOT EXISTS idx_visitors_phone ON visitors(phone);
         CREATE INDEX IF NOT EXISTS idx_visits_camp ON visits(camp_id);
         CREATE INDEX IF NOT EXISTS idx_notification_log_camp ON notification_log(camp_id, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
