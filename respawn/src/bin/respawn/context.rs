use anyhow::{Context, Result};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use respawn::{
    AuthUser, Config, Document, IdentityProvider, LocalIdentityProvider, MemoryStore, RedisStore, Session,
    config::CONFIG_DIR,
};

const MEMORY_DATA_FILE: &str = "data.json";

/// Who the command acts as. Nobody is signed in without `--as`.
#[derive(Clone, Debug, Default)]
pub struct IdentityArgs {
    pub uid: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl IdentityArgs {
    fn user(&self) -> Option<AuthUser> {
        let uid = self.uid.as_deref()?;
        let mut user = AuthUser::new(uid);
        if let Some(email) = &self.email {
            user = user.with_email(email);
        }
        if let Some(name) = &self.name {
            user = user.with_display_name(name);
        }
        Some(user)
    }
}

/// Loaded configuration plus the signed-in session for one invocation
pub struct AppContext {
    pub config: Config,
    pub config_dir: PathBuf,
    pub identity: Arc<LocalIdentityProvider>,
    pub session: Session,
    identity_args: IdentityArgs,
}

impl AppContext {
    pub fn load(config_path: Option<&Path>, identity_args: IdentityArgs) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => {
                let current_dir = std::env::current_dir().context("Failed to get current directory")?;
                Config::path_in(&current_dir)
            }
        };
        let config = Config::load(&config_path).context("Failed to load configuration")?;
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR));

        let mut identity = LocalIdentityProvider::new();
        if let Some(admin_email) = &config.identity.admin_email {
            identity = identity.with_reserved_email(admin_email);
        }
        let identity = Arc::new(identity);
        let mut session = Session::new(identity.clone());
        if let Some(admin_email) = &config.identity.admin_email {
            session = session.with_admin_email(admin_email);
        }

        Ok(Self {
            config,
            config_dir,
            identity,
            session,
            identity_args,
        })
    }

    /// Signs in the `--as` user, if any.
    pub fn sign_in(&self) -> Result<Option<AuthUser>> {
        match self.identity_args.user() {
            Some(user) => Ok(Some(self.identity.sign_in(user).context("Failed to sign in")?)),
            None => Ok(None),
        }
    }

    /// Registers the `--as` user as a new account. The admin email is reserved.
    pub fn sign_up(&self) -> Result<AuthUser> {
        let user = self
            .identity_args
            .user()
            .context("Pass --as <uid> to choose the account to register")?;
        Ok(self.identity.sign_up(user)?)
    }

    fn memory_data_path(&self) -> PathBuf {
        self.config_dir.join(MEMORY_DATA_FILE)
    }

    /// Memory store seeded from the data file next to the config.
    pub fn open_memory_store(&self) -> Result<MemoryStore> {
        let path = self.memory_data_path();
        if !path.exists() {
            return Ok(MemoryStore::new());
        }
        let content = std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let documents: BTreeMap<String, BTreeMap<String, Document>> =
            serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(MemoryStore::from_documents(documents))
    }

    pub fn save_memory_store(&self, store: &MemoryStore) -> Result<()> {
        let path = self.memory_data_path();
        std::fs::create_dir_all(&self.config_dir)
            .with_context(|| format!("Failed to create {}", self.config_dir.display()))?;
        let content = serde_json::to_string_pretty(&store.export()?)?;
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub async fn connect_redis(&self) -> Result<RedisStore> {
        let url = self
            .config
            .redis_url()
            .context("REDIS_URL environment variable not set. Set it to connect to Redis.")?;
        RedisStore::connect(&url, &self.config.store.prefix)
            .await
            .context("Failed to connect to Redis")
    }
}
