//! Idempotent schema bootstrap

/// Executed in order on startup. Every statement must be safe to re-run.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        username            VARCHAR PRIMARY KEY,
        hashed_password     VARCHAR NOT NULL,
        full_name           VARCHAR NOT NULL,
        email               VARCHAR UNIQUE NOT NULL,
        role                VARCHAR NOT NULL DEFAULT 'depositor',
        is_active           BOOLEAN NOT NULL DEFAULT TRUE,
        is_email_verified   BOOLEAN NOT NULL DEFAULT FALSE,
        password_changed_at TIMESTAMPTZ NOT NULL DEFAULT '0001-01-01 00:00:00Z',
        created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS verify_emails (
        id          BIGSERIAL PRIMARY KEY,
        username    VARCHAR NOT NULL REFERENCES users (username),
        email       VARCHAR NOT NULL,
        secret_code VARCHAR NOT NULL,
        is_used     BOOLEAN NOT NULL DEFAULT FALSE,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        expired_at  TIMESTAMPTZ NOT NULL DEFAULT (NOW() + INTERVAL '15 minutes')
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id         BIGSERIAL PRIMARY KEY,
        owner      VARCHAR NOT NULL REFERENCES users (username),
        balance    BIGINT NOT NULL CHECK (balance >= 0),
        currency   VARCHAR NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT owner_currency_key UNIQUE (owner, currency)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entries (
        id         BIGSERIAL PRIMARY KEY,
        account_id BIGINT NOT NULL REFERENCES accounts (id),
        amount     BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS transfers (
        id              BIGSERIAL PRIMARY KEY,
        from_account_id BIGINT NOT NULL REFERENCES accounts (id),
        to_account_id   BIGINT NOT NULL REFERENCES accounts (id),
        amount          BIGINT NOT NULL CHECK (amount > 0),
        created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS accounts_owner_idx ON accounts (owner)",
    "CREATE INDEX IF NOT EXISTS entries_account_id_idx ON entries (account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_from_account_id_idx ON transfers (from_account_id)",
    "CREATE INDEX IF NOT EXISTS transfers_to_account_id_idx ON transfers (to_account_id)",
    "CREATE INDEX IF NOT EXISTS verify_emails_username_idx ON verify_emails (username)",
];
