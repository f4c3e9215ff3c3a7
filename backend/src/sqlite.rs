use crate::{
    child_name, parent_name, Backend, BackendError, ChildCount, Folder, Group, Membership,
    Privilege, Resource, Result, Subject, SubjectKind,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

const SCHEMA: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS folder_nodes (
        name TEXT PRIMARY KEY,
        parent TEXT,
        extension TEXT NOT NULL,
        display_extension TEXT NOT NULL,
        description TEXT NOT NULL,
        creator_kind TEXT,
        creator_id TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS group_nodes (
        name TEXT PRIMARY KEY,
        parent TEXT NOT NULL,
        extension TEXT NOT NULL,
        display_extension TEXT NOT NULL,
        description TEXT NOT NULL,
        creator_kind TEXT,
        creator_id TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS memberships (
        group_name TEXT NOT NULL,
        member_kind TEXT NOT NULL,
        member_id TEXT NOT NULL,
        creator_kind TEXT,
        creator_id TEXT,
        PRIMARY KEY (group_name, member_kind, member_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS privileges (
        resource_kind TEXT NOT NULL,
        resource_name TEXT NOT NULL,
        subject_kind TEXT NOT NULL,
        subject_id TEXT NOT NULL,
        privilege TEXT NOT NULL,
        PRIMARY KEY (resource_kind, resource_name, subject_kind, subject_id, privilege)
    )
    "#,
];

type NodeRow = (String, String, String, String);

fn folder_from(row: NodeRow) -> Folder {
    let (name, extension, display_extension, description) = row;
    Folder {
        name,
        extension,
        display_extension,
        description,
    }
}

fn group_from(row: NodeRow) -> Group {
    let (name, extension, display_extension, description) = row;
    Group {
        name,
        extension,
        display_extension,
        description,
    }
}

fn subject_from(kind: Option<String>, id: Option<String>) -> Option<Subject> {
    let kind = SubjectKind::parse(kind.as_deref()?)?;
    Some(Subject { kind, id: id? })
}

/// Map a unique constraint violation to a lost creation
fn conflict_or(err: sqlx::Error, name: &str) -> BackendError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return BackendError::AlreadyExists(name.to_string());
        }
    }
    err.into()
}

/// Group store persisted in SQLite
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
    session: Subject,
}

impl SqliteBackend {
    /// Open (or create) the store at `database_path`
    pub async fn connect(database_path: &str, session: Subject) -> Result<Self> {
        let in_memory = database_path == ":memory:" || database_path == "sqlite::memory:";

        let connection_string = if in_memory {
            "sqlite::memory:".to_string()
        } else if database_path.starts_with("sqlite:") {
            database_path.to_string()
        } else {
            if let Some(parent) = Path::new(database_path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            if database_path.starts_with('/') {
                format!("sqlite://{}", database_path)
            } else {
                format!("sqlite:{}", database_path)
            }
        };

        info!("Connecting to group store at: {}", database_path);
        debug!("Using connection string: {}", connection_string);

        let options = SqliteConnectOptions::from_str(&connection_string)?.create_if_missing(true);
        // An in-memory database lives as long as its single connection
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        Self::with_pool(pool, session).await
    }

    pub async fn in_memory(session: Subject) -> Result<Self> {
        Self::connect(":memory:", session).await
    }

    pub async fn with_pool(pool: SqlitePool, session: Subject) -> Result<Self> {
        let backend = Self { pool, session };
        backend.initialize().await?;
        Ok(backend)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn initialize(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        sqlx::query(
            "INSERT OR IGNORE INTO folder_nodes (name, parent, extension, display_extension, description) \
             VALUES ('', NULL, '', '', 'Root')",
        )
        .execute(&self.pool)
        .await?;
        debug!("Group store schema ready");
        Ok(())
    }

    /// Register an externally managed folder, and its missing ancestors
    pub async fn seed_folder(&self, name: &str) -> Result<Folder> {
        let mut chain = Vec::new();
        let mut current = Some(name);
        while let Some(path) = current {
            if path.is_empty() {
                break;
            }
            chain.push(path);
            current = parent_name(path);
        }

        for path in chain.into_iter().rev() {
            let extension = path.rsplit_once(crate::SEPARATOR).map_or(path, |(_, tail)| tail);
            sqlx::query(
                "INSERT OR IGNORE INTO folder_nodes (name, parent, extension, display_extension, description) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(path)
            .bind(parent_name(path).unwrap_or_default())
            .bind(extension)
            .bind(extension)
            .bind(extension)
            .execute(&self.pool)
            .await?;
        }

        info!("Seeded folder {}", name);
        self.find_folder(name)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("folder {}", name)))
    }

    /// Register an externally managed group
    pub async fn seed_group(&self, name: &str) -> Result<Group> {
        let parent = parent_name(name).unwrap_or_default();
        if !parent.is_empty() {
            self.seed_folder(parent).await?;
        }
        let extension = name.rsplit_once(crate::SEPARATOR).map_or(name, |(_, tail)| tail);
        sqlx::query(
            "INSERT OR IGNORE INTO group_nodes (name, parent, extension, display_extension, description) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(parent)
        .bind(extension)
        .bind(extension)
        .bind(extension)
        .execute(&self.pool)
        .await?;

        info!("Seeded group {}", name);
        self.find_group(name)
            .await?
            .ok_or_else(|| BackendError::NotFound(format!("group {}", name)))
    }

    async fn name_taken(&self, name: &str) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM folder_nodes WHERE name = ?) \
                  + (SELECT COUNT(*) FROM group_nodes WHERE name = ?)",
        )
        .bind(name)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn prepare_child(&self, parent: &Folder, extension: &str) -> Result<String> {
        if self.find_folder(&parent.name).await?.is_none() {
            return Err(BackendError::NotFound(format!("folder {}", parent.name)));
        }
        let name = child_name(&parent.name, extension);
        if self.name_taken(&name).await? {
            return Err(BackendError::AlreadyExists(name));
        }
        Ok(name)
    }

    async fn resource_exists(&self, resource: &Resource) -> Result<bool> {
        let sql = match resource {
            Resource::Group(_) => "SELECT COUNT(*) FROM group_nodes WHERE name = ?",
            Resource::Folder(_) => "SELECT COUNT(*) FROM folder_nodes WHERE name = ?",
        };
        let (count,): (i64,) = sqlx::query_as(sql)
            .bind(resource.name())
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn session_subject(&self) -> &Subject {
        &self.session
    }

    async fn find_folder(&self, path: &str) -> Result<Option<Folder>> {
        let row: Option<NodeRow> = sqlx::query_as(
            "SELECT name, extension, display_extension, description FROM folder_nodes WHERE name = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(folder_from))
    }

    async fn find_group(&self, path: &str) -> Result<Option<Group>> {
        let row: Option<NodeRow> = sqlx::query_as(
            "SELECT name, extension, display_extension, description FROM group_nodes WHERE name = ?",
        )
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(group_from))
    }

    async fn create_child_folder(
        &self,
        parent: &Folder,
        extension: &str,
        display_extension: &str,
        description: &str,
    ) -> Result<Folder> {
        let name = self.prepare_child(parent, extension).await?;
        sqlx::query(
            "INSERT INTO folder_nodes \
             (name, parent, extension, display_extension, description, creator_kind, creator_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(&parent.name)
        .bind(extension)
        .bind(display_extension)
        .bind(description)
        .bind(self.session.kind.as_str())
        .bind(&self.session.id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or(e, &name))?;

        debug!("Inserted folder {}", name);
        Ok(Folder {
            name,
            extension: extension.to_string(),
            display_extension: display_extension.to_string(),
            description: description.to_string(),
        })
    }

    async fn create_child_group(
        &self,
        parent: &Folder,
        extension: &str,
        display_extension: &str,
        description: &str,
    ) -> Result<Group> {
        let name = self.prepare_child(parent, extension).await?;
        sqlx::query(
            "INSERT INTO group_nodes \
             (name, parent, extension, display_extension, description, creator_kind, creator_id) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&name)
        .bind(&parent.name)
        .bind(extension)
        .bind(display_extension)
        .bind(description)
        .bind(self.session.kind.as_str())
        .bind(&self.session.id)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_or(e, &name))?;

        debug!("Inserted group {}", name);
        Ok(Group {
            name,
            extension: extension.to_string(),
            display_extension: display_extension.to_string(),
            description: description.to_string(),
        })
    }

    async fn has_privilege(
        &self,
        resource: &Resource,
        subject: &Subject,
        privilege: Privilege,
    ) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM privileges WHERE resource_kind = ? AND resource_name = ? \
             AND subject_kind = ? AND subject_id = ? AND privilege = ?",
        )
        .bind(resource.kind_name())
        .bind(resource.name())
        .bind(subject.kind.as_str())
        .bind(&subject.id)
        .bind(privilege.name())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn grant_privilege(
        &self,
        resource: &Resource,
        subject: &Subject,
        privilege: Privilege,
    ) -> Result<()> {
        privilege.check_applies(resource)?;
        if !self.resource_exists(resource).await? {
            return Err(BackendError::NotFound(resource.to_string()));
        }
        sqlx::query(
            "INSERT OR IGNORE INTO privileges \
             (resource_kind, resource_name, subject_kind, subject_id, privilege) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(resource.kind_name())
        .bind(resource.name())
        .bind(subject.kind.as_str())
        .bind(&subject.id)
        .bind(privilege.name())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn has_member(&self, group: &Group, subject: &Subject) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM memberships WHERE group_name = ? AND member_kind = ? AND member_id = ?",
        )
        .bind(&group.name)
        .bind(subject.kind.as_str())
        .bind(&subject.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    async fn add_member(&self, group: &Group, subject: &Subject) -> Result<()> {
        if self.find_group(&group.name).await?.is_none() {
            return Err(BackendError::NotFound(format!("group {}", group.name)));
        }
        sqlx::query(
            "INSERT OR IGNORE INTO memberships \
             (group_name, member_kind, member_id, creator_kind, creator_id) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&group.name)
        .bind(subject.kind.as_str())
        .bind(&subject.id)
        .bind(self.session.kind.as_str())
        .bind(&self.session.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_member(&self, group: &Group, subject: &Subject) -> Result<()> {
        let result = sqlx::query(
            "DELETE FROM memberships WHERE group_name = ? AND member_kind = ? AND member_id = ?",
        )
        .bind(&group.name)
        .bind(subject.kind.as_str())
        .bind(&subject.id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(BackendError::NotFound(format!(
                "{} is not a member of {}",
                subject, group.name
            )));
        }
        Ok(())
    }

    async fn child_count(&self, folder: &Folder) -> Result<ChildCount> {
        let (folders, groups): (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM folder_nodes WHERE parent = ? AND name <> ''), \
                    (SELECT COUNT(*) FROM group_nodes WHERE parent = ?)",
        )
        .bind(&folder.name)
        .bind(&folder.name)
        .fetch_one(&self.pool)
        .await?;
        Ok(ChildCount {
            groups: groups.max(0) as usize,
            folders: folders.max(0) as usize,
        })
    }

    async fn member_count(&self, group: &Group) -> Result<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memberships WHERE group_name = ?")
            .bind(&group.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }

    async fn list_immediate_memberships(&self, subject: &Subject) -> Result<Vec<Membership>> {
        let rows: Vec<(String, String, String, String, Option<String>, Option<String>)> =
            sqlx::query_as(
                "SELECT g.name, g.extension, g.display_extension, g.description, m.creator_kind, m.creator_id \
                 FROM memberships m JOIN group_nodes g ON g.name = m.group_name \
                 WHERE m.member_kind = ? AND m.member_id = ? ORDER BY g.name",
            )
            .bind(subject.kind.as_str())
            .bind(&subject.id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(name, extension, display_extension, description, creator_kind, creator_id)| {
                    Membership {
                        group: group_from((name, extension, display_extension, description)),
                        creator: subject_from(creator_kind, creator_id),
                    }
                },
            )
            .collect())
    }

    async fn creator_of(&self, resource: &Resource) -> Result<Option<Subject>> {
        let sql = match resource {
            Resource::Group(_) => "SELECT creator_kind, creator_id FROM group_nodes WHERE name = ?",
            Resource::Folder(_) => "SELECT creator_kind, creator_id FROM folder_nodes WHERE name = ?",
        };
        let row: Option<(Option<String>, Option<String>)> = sqlx::query_as(sql)
            .bind(resource.name())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some((kind, id)) => Ok(subject_from(kind, id)),
            None => Err(BackendError::NotFound(resource.to_string())),
        }
    }

    async fn delete(&self, resource: &Resource) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        match resource {
            Resource::Group(group) => {
                let result = sqlx::query("DELETE FROM group_nodes WHERE name = ?")
                    .bind(&group.name)
                    .execute(&mut *tx)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(BackendError::NotFound(resource.to_string()));
                }
                sqlx::query(
                    "DELETE FROM memberships WHERE group_name = ? \
                     OR (member_kind = 'group' AND member_id = ?)",
                )
                .bind(&group.name)
                .bind(&group.name)
                .execute(&mut *tx)
                .await?;
                sqlx::query(
                    "DELETE FROM privileges WHERE (resource_kind = 'group' AND resource_name = ?) \
                     OR (subject_kind = 'group' AND subject_id = ?)",
                )
                .bind(&group.name)
                .bind(&group.name)
                .execute(&mut *tx)
                .await?;
            }
            Resource::Folder(folder) => {
                if folder.is_root() {
                    return Err(BackendError::InsufficientPrivilege(
                        "the root folder cannot be deleted".to_string(),
                    ));
                }
                let (children,): (i64,) = sqlx::query_as(
                    "SELECT (SELECT COUNT(*) FROM folder_nodes WHERE parent = ?) \
                          + (SELECT COUNT(*) FROM group_nodes WHERE parent = ?)",
                )
                .bind(&folder.name)
                .bind(&folder.name)
                .fetch_one(&mut *tx)
                .await?;
                if children > 0 {
                    return Err(BackendError::Schema(format!(
                        "folder {} is not empty",
                        folder.name
                    )));
                }
                let result = sqlx::query("DELETE FROM folder_nodes WHERE name = ?")
                    .bind(&folder.name)
                    .execute(&mut *tx)
                    .await?;
                if result.rows_affected() == 0 {
                    return Err(BackendError::NotFound(resource.to_string()));
                }
                sqlx::query("DELETE FROM privileges WHERE resource_kind = 'folder' AND resource_name = ?")
                    .bind(&folder.name)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        debug!("Deleted {}", resource);
        Ok(())
    }
}
