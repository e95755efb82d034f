/// SQLite-backed device repository using runtime queries
use crate::{
    device::{AuthorizedDevice, DeviceRepository, NewDevice},
    error::{GateError, GateResult},
};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Device registry backed by the `authorized_devices` table
#[derive(Clone)]
pub struct SqliteDeviceRepository {
    db: SqlitePool,
}

impl SqliteDeviceRepository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    fn device_from_row(row: &sqlx::sqlite::SqliteRow) -> AuthorizedDevice {
        AuthorizedDevice {
            id: row.get("id"),
            user_id: row.get("user_id"),
            device_id: row.get("device_id"),
            device_fingerprint: row.get("device_fingerprint"),
            device_name: row.get("device_name"),
            browser: row.get("browser"),
            os: row.get("os"),
            platform: row.get("platform"),
            is_active: row.get("is_active"),
            session_token: row.get("session_token"),
            created_at: row.get("created_at"),
            last_used_at: row.get("last_used_at"),
        }
    }
}

#[async_trait]
impl DeviceRepository for SqliteDeviceRepository {
    async fn list_active(&self, user_id: &str) -> GateResult<Vec<AuthorizedDevice>> {
        let rows = sqlx::query(
            "SELECT id, user_id, device_id, device_fingerprint, device_name, browser, os,
                    platform, is_active, session_token, created_at, last_used_at
             FROM authorized_devices
             WHERE user_id = ?1 AND is_active = TRUE
             ORDER BY last_used_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await
        .map_err(GateError::Store)?;

        Ok(rows.iter().map(Self::device_from_row).collect())
    }

    async fn find_by_fingerprint(
        &self,
        user_id: &str,
        fingerprint: &str,
    ) -> GateResult<Option<AuthorizedDevice>> {
        let row = sqlx::query(
            "SELECT id, user_id, device_id, device_fingerprint, device_name, browser, os,
                    platform, is_active, session_token, created_at, last_used_at
             FROM authorized_devices
             WHERE user_id = ?1 AND device_fingerprint = ?2",
        )
        .bind(user_id)
        .bind(fingerprint)
        .fetch_optional(&self.db)
        .await
        .map_err(GateError::Store)?;

        Ok(row.as_ref().map(Self::device_from_row))
    }

    async fn insert(&self, device: NewDevice) -> GateResult<AuthorizedDevice> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO authorized_devices
                 (id, user_id, device_id, device_fingerprint, device_name, browser, os,
                  platform, is_active, session_token, created_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, TRUE, ?9, ?10, ?11)",
        )
        .bind(&id)
        .bind(&device.user_id)
        .bind(&device.device_id)
        .bind(&device.device_fingerprint)
        .bind(&device.device_name)
        .bind(&device.browser)
        .bind(&device.os)
        .bind(&device.platform)
        .bind(&device.session_token)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .map_err(GateError::Store)?;

        Ok(AuthorizedDevice {
            id,
            user_id: device.user_id,
            device_id: device.device_id,
            device_fingerprint: device.device_fingerprint,
            device_name: device.device_name,
            browser: device.browser,
            os: device.os,
            platform: device.platform,
            is_active: true,
            session_token: Some(device.session_token),
            created_at: now,
            last_used_at: now,
        })
    }

    async fn activate(&self, id: &str, session_token: &str) -> GateResult<()> {
        sqlx::query(
            "UPDATE authorized_devices
             SET is_active = TRUE, session_token = ?1, last_used_at = ?2
             WHERE id = ?3",
        )
        .bind(session_token)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(GateError::Store)?;

        Ok(())
    }

    async fn deactivate(&self, id: &str, user_id: &str) -> GateResult<()> {
        sqlx::query(
            "UPDATE authorized_devices
             SET is_active = FALSE, session_token = NULL
             WHERE id = ?1 AND user_id = ?2",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.db)
        .await
        .map_err(GateError::Store)?;

        Ok(())
    }

    async fn deactivate_by_session(&self, session_token: &str) -> GateResult<()> {
        sqlx::query(
            "UPDATE authorized_devices
             SET is_active = FALSE, session_token = NULL
             WHERE session_token = ?1",
        )
        .bind(session_token)
        .execute(&self.db)
        .await
        .map_err(GateError::Store)?;

        Ok(())
    }

    async fn delete(&self, id: &str, user_id: &str) -> GateResult<()> {
        let row = sqlx::query(
            "SELECT is_active FROM authorized_devices WHERE id = ?1 AND user_id = ?2",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await
        .map_err(GateError::Store)?
        .ok_or_else(|| GateError::NotFound("Device not found".to_string()))?;

        let is_active: bool = row.get("is_active");
        if is_active {
            return Err(GateError::Validation(
                "Device must be signed out before it can be removed".to_string(),
            ));
        }

        sqlx::query("DELETE FROM authorized_devices WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .map_err(GateError::Store)?;

        Ok(())
    }

    async fn touch(&self, user_id: &str, fingerprint: &str) -> GateResult<()> {
        sqlx::query(
            "UPDATE authorized_devices
             SET last_used_at = ?1
             WHERE user_id = ?2 AND device_fingerprint = ?3 AND is_active = TRUE",
        )
        .bind(Utc::now())
        .bind(user_id)
        .bind(fingerprint)
        .execute(&self.db)
        .await
        .map_err(GateError::Store)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations, DatabaseOptions};
    use tempfile::tempdir;

    async fn test_repository() -> (tempfile::TempDir, SqliteDeviceRepository) {
        let dir = tempdir().unwrap();
        let pool = create_pool(&dir.path().join("devices.sqlite"), DatabaseOptions::default())
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        (dir, SqliteDeviceRepository::new(pool))
    }

    fn new_device(user_id: &str, fingerprint: &str, token: &str) -> NewDevice {
        NewDevice {
            user_id: user_id.to_string(),
            device_id: Uuid::new_v4().to_string(),
            device_fingerprint: fingerprint.to_string(),
            device_name: "Chrome on macOS".to_string(),
            browser: "Chrome".to_string(),
            os: "macOS".to_string(),
            platform: "desktop".to_string(),
            session_token: token.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_by_fingerprint() {
        let (_dir, repo) = test_repository().await;

        let inserted = repo.insert(new_device("u1", "f1", "tok1")).await.unwrap();
        assert!(inserted.is_active);
        assert_eq!(inserted.session_token.as_deref(), Some("tok1"));

        let found = repo.find_by_fingerprint("u1", "f1").await.unwrap().unwrap();
        assert_eq!(found.id, inserted.id);

        // Scoped by user: another user never sees the row
        assert!(repo.find_by_fingerprint("u2", "f1").await.unwrap().is_none());
        // Unknown fingerprint is None, not an error
        assert!(repo.find_by_fingerprint("u1", "f9").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_active_excludes_deactivated_rows() {
        let (_dir, repo) = test_repository().await;

        let a = repo.insert(new_device("u1", "f1", "tok1")).await.unwrap();
        repo.insert(new_device("u1", "f2", "tok2")).await.unwrap();

        repo.deactivate(&a.id, "u1").await.unwrap();

        let active = repo.list_active("u1").await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].device_fingerprint, "f2");
    }

    #[tokio::test]
    async fn test_activate_rebinds_token_and_refreshes_activity() {
        let (_dir, repo) = test_repository().await;

        let device = repo.insert(new_device("u1", "f1", "tok1")).await.unwrap();
        repo.deactivate(&device.id, "u1").await.unwrap();

        repo.activate(&device.id, "tok2").await.unwrap();

        let found = repo.find_by_fingerprint("u1", "f1").await.unwrap().unwrap();
        assert!(found.is_active);
        assert_eq!(found.session_token.as_deref(), Some("tok2"));
        assert!(found.last_used_at >= device.last_used_at);
    }

    #[tokio::test]
    async fn test_deactivate_by_session_is_idempotent() {
        let (_dir, repo) = test_repository().await;

        repo.insert(new_device("u1", "f1", "tok1")).await.unwrap();

        repo.deactivate_by_session("tok1").await.unwrap();
        // Second call matches no row and is a no-op, not an error
        repo.deactivate_by_session("tok1").await.unwrap();

        let found = repo.find_by_fingerprint("u1", "f1").await.unwrap().unwrap();
        assert!(!found.is_active);
        assert!(found.session_token.is_none());
    }

    #[tokio::test]
    async fn test_delete_refuses_active_rows() {
        let (_dir, repo) = test_repository().await;

        let device = repo.insert(new_device("u1", "f1", "tok1")).await.unwrap();

        let err = repo.delete(&device.id, "u1").await.unwrap_err();
        assert!(matches!(err, GateError::Validation(_)));

        repo.deactivate(&device.id, "u1").await.unwrap();
        repo.delete(&device.id, "u1").await.unwrap();
        assert!(repo.find_by_fingerprint("u1", "f1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_only_refreshes_active_rows() {
        let (_dir, repo) = test_repository().await;

        let device = repo.insert(new_device("u1", "f1", "tok1")).await.unwrap();
        repo.touch("u1", "f1").await.unwrap();

        let touched = repo.find_by_fingerprint("u1", "f1").await.unwrap().unwrap();
        assert!(touched.last_used_at >= device.last_used_at);

        repo.deactivate(&device.id, "u1").await.unwrap();
        // No active row matches; silently a no-op
        repo.touch("u1", "f1").await.unwrap();
        let after = repo.find_by_fingerprint("u1", "f1").await.unwrap().unwrap();
        assert!(!after.is_active);
    }
}
