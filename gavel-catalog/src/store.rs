use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use gavel_core::GuildId;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// A catalogued piece of evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthBullet {
    pub id: u64,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("can't access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("bad catalog file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("a truth bullet needs a name")]
    EmptyName,
}

pub type Result<T> = std::result::Result<T, CatalogError>;

/// On-disk shape of one guild's catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Ledger {
    bullets: BTreeMap<u64, TruthBullet>,
    next_id: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            bullets: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl Ledger {
    fn find(&self, identifier: &str) -> Option<&TruthBullet> {
        let identifier = identifier.trim();
        // Any integer is an id, so "-3" names nothing rather than a bullet.
        match identifier.parse::<i64>() {
            Ok(id) => u64::try_from(id).ok().and_then(|id| self.bullets.get(&id)),
            Err(_) => self
                .bullets
                .values()
                .find(|b| b.name.to_lowercase() == identifier.to_lowercase()),
        }
    }
}

/// File-backed catalog for every guild, loaded lazily and cached.
pub struct Catalog {
    dir: PathBuf,
    guilds: Mutex<HashMap<GuildId, Ledger>>,
}

impl Catalog {
    /// Open (and create if needed) the data directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| CatalogError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            guilds: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, guild: GuildId) -> PathBuf {
        self.dir.join(format!("truth_bullets_{guild}.json"))
    }

    fn load(&self, guild: GuildId) -> Result<Ledger> {
        let path = self.path_for(guild);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Ledger::default()),
            Err(source) => return Err(CatalogError::Io { path, source }),
        };
        let ledger: Ledger = serde_json::from_str(&raw).map_err(|source| {
            tracing::warn!(%guild, path = %path.display(), "Unreadable catalog file");
            CatalogError::Corrupt {
                path: path.clone(),
                source,
            }
        })?;
        tracing::debug!(%guild, bullets = ledger.bullets.len(), "Loaded catalog");
        Ok(ledger)
    }

    fn save(&self, guild: GuildId, ledger: &Ledger) -> Result<()> {
        let path = self.path_for(guild);
        let json = serde_json::to_string_pretty(ledger).map_err(|source| CatalogError::Corrupt {
            path: path.clone(),
            source,
        })?;
        // Replace atomically.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| CatalogError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| CatalogError::Io { path, source })
    }

    fn cached<'a>(
        &self,
        guilds: &'a mut HashMap<GuildId, Ledger>,
        guild: GuildId,
    ) -> Result<&'a mut Ledger> {
        if !guilds.contains_key(&guild) {
            let ledger = self.load(guild)?;
            guilds.insert(guild, ledger);
        }
        Ok(guilds.entry(guild).or_default())
    }

    /// Read the guild's ledger, loading it on first use.
    fn with_ledger<T>(&self, guild: GuildId, f: impl FnOnce(&Ledger) -> T) -> Result<T> {
        let mut guilds = self.guilds.lock();
        Ok(f(self.cached(&mut guilds, guild)?))
    }

    /// Apply a change and persist it. The cached ledger only changes if the
    /// write succeeded.
    fn update<T>(&self, guild: GuildId, f: impl FnOnce(&mut Ledger) -> T) -> Result<T> {
        let mut guilds = self.guilds.lock();
        let ledger = self.cached(&mut guilds, guild)?;
        let mut draft = ledger.clone();
        let out = f(&mut draft);
        self.save(guild, &draft)?;
        *ledger = draft;
        Ok(out)
    }

    pub fn add(
        &self,
        guild: GuildId,
        name: &str,
        description: &str,
        image_url: Option<String>,
    ) -> Result<TruthBullet> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CatalogError::EmptyName);
        }
        let bullet = self.update(guild, |ledger| {
            let bullet = TruthBullet {
                id: ledger.next_id,
                name: name.to_string(),
                description: description.trim().to_string(),
                image_url,
            };
            ledger.next_id += 1;
            ledger.bullets.insert(bullet.id, bullet.clone());
            bullet
        })?;
        tracing::info!(%guild, id = bullet.id, name = %bullet.name, "Added truth bullet");
        Ok(bullet)
    }

    /// Look up by numeric id, or else by case-insensitive name.
    pub fn get(&self, guild: GuildId, identifier: &str) -> Result<Option<TruthBullet>> {
        self.with_ledger(guild, |ledger| ledger.find(identifier).cloned())
    }

    /// Remove by id. Returns whether anything was removed.
    pub fn remove(&self, guild: GuildId, id: u64) -> Result<bool> {
        if !self.with_ledger(guild, |ledger| ledger.bullets.contains_key(&id))? {
            return Ok(false);
        }
        self.update(guild, |ledger| ledger.bullets.remove(&id))?;
        tracing::info!(%guild, id, "Removed truth bullet");
        Ok(true)
    }

    /// Every bullet in the guild, ordered by id.
    pub fn list(&self, guild: GuildId) -> Result<Vec<TruthBullet>> {
        self.with_ledger(guild, |ledger| ledger.bullets.values().cloned().collect())
    }
}
