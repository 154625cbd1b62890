use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_roles (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            role        TEXT NOT NULL CHECK (role IN ('admin', 'donor', 'ngo', 'volunteer')),
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_user_roles_role ON user_roles(role);

        CREATE TABLE IF NOT EXISTS profiles (
            id                  TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            full_name           TEXT NOT NULL,
            phone               TEXT,
            address             TEXT,
            latitude            REAL,
            longitude           REAL,
            bio                 TEXT,
            avatar_url          TEXT,
            total_donations     INTEGER NOT NULL DEFAULT 0,
            total_meals_donated INTEGER NOT NULL DEFAULT 0,
            total_deliveries    INTEGER NOT NULL DEFAULT 0,
            co2_saved_kg        REAL NOT NULL DEFAULT 0,
            average_rating      REAL,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS donations (
            id                  TEXT PRIMARY KEY,
            donor_id            TEXT NOT NULL REFERENCES users(id),
            title               TEXT NOT NULL,
            description         TEXT,
            food_type           TEXT NOT NULL,
            quantity            TEXT NOT NULL,
            estimated_meals     INTEGER,
            pickup_address      TEXT NOT NULL,
            pickup_latitude     REAL NOT NULL,
            pickup_longitude    REAL NOT NULL,
            pickup_instructions TEXT,
            expiry_time         TEXT NOT NULL,
            images              TEXT NOT NULL DEFAULT '[]',
            status              TEXT NOT NULL DEFAULT 'available',
            requested_by        TEXT REFERENCES users(id),
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_donations_donor ON donations(donor_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_donations_status ON donations(status, expiry_time);

        CREATE TABLE IF NOT EXISTS volunteer_tasks (
            id                      TEXT PRIMARY KEY,
            donation_id             TEXT NOT NULL REFERENCES donations(id),
            donor_id                TEXT NOT NULL REFERENCES users(id),
            ngo_id                  TEXT NOT NULL REFERENCES users(id),
            volunteer_id            TEXT REFERENCES users(id),
            pickup_address          TEXT NOT NULL,
            pickup_latitude         REAL NOT NULL,
            pickup_longitude        REAL NOT NULL,
            dropoff_address         TEXT NOT NULL,
            dropoff_latitude        REAL NOT NULL,
            dropoff_longitude       REAL NOT NULL,
            estimated_distance_km   REAL,
            status                  TEXT NOT NULL DEFAULT 'available',
            accepted_at             TEXT,
            picked_up_at            TEXT,
            delivered_at            TEXT,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_donation ON volunteer_tasks(donation_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_status ON volunteer_tasks(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_tasks_volunteer ON volunteer_tasks(volunteer_id);

        CREATE TABLE IF NOT EXISTS ratings (
            id              TEXT PRIMARY KEY,
            task_id         TEXT NOT NULL REFERENCES volunteer_tasks(id),
            rater_id        TEXT NOT NULL REFERENCES users(id),
            rated_user_id   TEXT NOT NULL REFERENCES users(id),
            rating          INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
            comment         TEXT,
            category        TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            UNIQUE(task_id, rater_id, rated_user_id)
        );

        CREATE INDEX IF NOT EXISTS idx_ratings_rated ON ratings(rated_user_id);

        CREATE TABLE IF NOT EXISTS badges (
            id                  TEXT PRIMARY KEY,
            name                TEXT NOT NULL UNIQUE,
            description         TEXT NOT NULL,
            icon                TEXT NOT NULL,
            category            TEXT NOT NULL,
            requirement_value   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_badges (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            badge_id    TEXT NOT NULL REFERENCES badges(id),
            earned_at   TEXT NOT NULL,
            UNIQUE(user_id, badge_id)
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            type        TEXT NOT NULL,
            title       TEXT NOT NULL,
            message     TEXT NOT NULL,
            related_id  TEXT,
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at);

        CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY,
            task_id     TEXT NOT NULL REFERENCES volunteer_tasks(id),
            sender_id   TEXT NOT NULL REFERENCES users(id),
            receiver_id TEXT NOT NULL REFERENCES users(id),
            message     TEXT NOT NULL,
            is_read     INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_task ON chat_messages(task_id, created_at);

        CREATE TABLE IF NOT EXISTS ngo_verifications (
            id                      TEXT PRIMARY KEY,
            user_id                 TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            organization_name       TEXT NOT NULL,
            registration_id         TEXT NOT NULL,
            organization_type       TEXT,
            contact_person          TEXT,
            contact_email           TEXT,
            contact_phone           TEXT,
            website                 TEXT,
            description             TEXT,
            verification_documents  TEXT NOT NULL DEFAULT '[]',
            status                  TEXT NOT NULL DEFAULT 'pending',
            rejection_reason        TEXT,
            verified_by             TEXT REFERENCES users(id),
            verified_at             TEXT,
            created_at              TEXT NOT NULL,
            updated_at              TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS wishlists (
            id                  TEXT PRIMARY KEY,
            ngo_id              TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            item_name           TEXT NOT NULL,
            quantity_needed     TEXT NOT NULL,
            fulfilled_quantity  INTEGER NOT NULL DEFAULT 0,
            category            TEXT,
            description         TEXT,
            priority            TEXT NOT NULL DEFAULT 'medium',
            status              TEXT NOT NULL DEFAULT 'open',
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_wishlists_status ON wishlists(status, created_at);

        -- Seed the badge catalogue
        INSERT OR IGNORE INTO badges (id, name, description, icon, category, requirement_value) VALUES
            ('00000000-0000-0000-0000-00000000d001', 'First Donation', 'Posted your first donation', '🍱', 'donor', 1),
            ('00000000-0000-0000-0000-00000000d005', 'Generous Giver', 'Posted 5 donations', '🤝', 'donor', 5),
            ('00000000-0000-0000-0000-00000000d025', 'Food Hero', 'Posted 25 donations', '🦸', 'donor', 25),
            ('00000000-0000-0000-0000-00000000d100', 'Hunger Fighter', 'Posted 100 donations', '🏆', 'donor', 100),
            ('00000000-0000-0000-0000-00000000e001', 'First Delivery', 'Completed your first delivery', '🚲', 'volunteer', 1),
            ('00000000-0000-0000-0000-00000000e010', 'Road Runner', 'Completed 10 deliveries', '🏃', 'volunteer', 10),
            ('00000000-0000-0000-0000-00000000e025', 'Delivery Champion', 'Completed 25 deliveries', '🥇', 'volunteer', 25),
            ('00000000-0000-0000-0000-00000000e050', 'Community Pillar', 'Completed 50 deliveries', '🌟', 'volunteer', 50);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
