use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use bilten_mfa::domain::repository::{
    ChallengeRepository, MethodCache, MethodCacheKey, MethodRepository, QrRenderer,
    SettingsRepository, UserRepository,
};
use bilten_mfa::domain::types::{
    ChallengePurpose, MethodKind, MethodPatch, MfaChallenge, MfaMethod, MfaSettings, MfaUser,
    OutboxEvent, SettingsPatch,
};
use bilten_mfa::error::MfaServiceError;

/// RFC 6238 test secret ("12345678901234567890" in base32).
pub const TEST_SECRET: &str = "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";

// ── MockUserRepo ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockUserRepo {
    pub users: Arc<Mutex<Vec<MfaUser>>>,
}

impl MockUserRepo {
    pub fn new(users: Vec<MfaUser>) -> Self {
        Self {
            users: Arc::new(Mutex::new(users)),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    pub fn users_handle(&self) -> Arc<Mutex<Vec<MfaUser>>> {
        Arc::clone(&self.users)
    }
}

impl UserRepository for MockUserRepo {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MfaUser>, MfaServiceError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn set_mfa_enabled(
        &self,
        user_id: Uuid,
        enabled: bool,
        method: Option<&str>,
    ) -> Result<(), MfaServiceError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(MfaServiceError::UserNotFound)?;
        user.mfa_enabled = enabled;
        user.mfa_method = method.map(str::to_owned);
        Ok(())
    }
}

// ── MockMethodRepo ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockMethodRepo {
    pub methods: Arc<Mutex<Vec<MfaMethod>>>,
}

impl MockMethodRepo {
    pub fn new(methods: Vec<MfaMethod>) -> Self {
        Self {
            methods: Arc::new(Mutex::new(methods)),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    pub fn methods_handle(&self) -> Arc<Mutex<Vec<MfaMethod>>> {
        Arc::clone(&self.methods)
    }
}

impl MethodRepository for MockMethodRepo {
    async fn insert(&self, method: &MfaMethod) -> Result<(), MfaServiceError> {
        let mut methods = self.methods.lock().unwrap();
        // Mirrors the partial unique index on (user_id, kind).
        if methods
            .iter()
            .any(|m| m.user_id == method.user_id && m.kind == method.kind)
        {
            return Err(MfaServiceError::DuplicateMethod(method.kind));
        }
        methods.push(method.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MfaMethod>, MfaServiceError> {
        Ok(self.methods.lock().unwrap().iter().find(|m| m.id == id).cloned())
    }

    async fn find_by_user_and_kind(
        &self,
        user_id: Uuid,
        kind: MethodKind,
    ) -> Result<Option<MfaMethod>, MfaServiceError> {
        Ok(self
            .methods
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.user_id == user_id && m.kind == kind)
            .cloned())
    }

    async fn list_by_user(
        &self,
        user_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<MfaMethod>, MfaServiceError> {
        let mut found: Vec<MfaMethod> = self
            .methods
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id && (!active_only || m.is_active))
            .cloned()
            .collect();
        found.sort_by_key(|m| m.created_at);
        Ok(found)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &MethodPatch,
    ) -> Result<MfaMethod, MfaServiceError> {
        let mut methods = self.methods.lock().unwrap();
        let method = methods
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(MfaServiceError::MethodNotFound)?;
        if let Some(secret) = &patch.secret {
            method.secret = secret.clone();
        }
        if let Some(phone) = &patch.phone_number {
            method.phone_number = phone.clone();
        }
        if let Some(is_active) = patch.is_active {
            method.is_active = is_active;
        }
        method.updated_at = Utc::now();
        Ok(method.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), MfaServiceError> {
        self.methods.lock().unwrap().retain(|m| m.id != id);
        Ok(())
    }
}

// ── Caches ───────────────────────────────────────────────────────────────────

/// Cache that stores nothing; every read is a miss.
#[derive(Clone)]
pub struct NullMethodCache;

impl MethodCache for NullMethodCache {
    async fn get_method(
        &self,
        _key: &MethodCacheKey,
    ) -> Result<Option<MfaMethod>, MfaServiceError> {
        Ok(None)
    }

    async fn put_method(
        &self,
        _key: &MethodCacheKey,
        _method: &MfaMethod,
    ) -> Result<(), MfaServiceError> {
        Ok(())
    }

    async fn get_list(
        &self,
        _key: &MethodCacheKey,
    ) -> Result<Option<Vec<MfaMethod>>, MfaServiceError> {
        Ok(None)
    }

    async fn put_list(
        &self,
        _key: &MethodCacheKey,
        _methods: &[MfaMethod],
    ) -> Result<(), MfaServiceError> {
        Ok(())
    }

    async fn invalidate(&self, _keys: &[MethodCacheKey]) -> Result<(), MfaServiceError> {
        Ok(())
    }
}

#[derive(Default)]
struct MemoryCacheInner {
    methods: HashMap<String, MfaMethod>,
    lists: HashMap<String, Vec<MfaMethod>>,
}

fn cache_key(key: &MethodCacheKey) -> String {
    format!("{key:?}")
}

/// In-memory stand-in for the Redis cache, for invalidation assertions.
#[derive(Clone, Default)]
pub struct MemoryMethodCache {
    inner: Arc<Mutex<MemoryCacheInner>>,
}

impl MemoryMethodCache {
    pub fn cached_method(&self, key: &MethodCacheKey) -> Option<MfaMethod> {
        self.inner.lock().unwrap().methods.get(&cache_key(key)).cloned()
    }

    pub fn cached_list(&self, key: &MethodCacheKey) -> Option<Vec<MfaMethod>> {
        self.inner.lock().unwrap().lists.get(&cache_key(key)).cloned()
    }
}

impl MethodCache for MemoryMethodCache {
    async fn get_method(
        &self,
        key: &MethodCacheKey,
    ) -> Result<Option<MfaMethod>, MfaServiceError> {
        Ok(self.cached_method(key))
    }

    async fn put_method(
        &self,
        key: &MethodCacheKey,
        method: &MfaMethod,
    ) -> Result<(), MfaServiceError> {
        self.inner
            .lock()
            .unwrap()
            .methods
            .insert(cache_key(key), method.clone());
        Ok(())
    }

    async fn get_list(
        &self,
        key: &MethodCacheKey,
    ) -> Result<Option<Vec<MfaMethod>>, MfaServiceError> {
        Ok(self.cached_list(key))
    }

    async fn put_list(
        &self,
        key: &MethodCacheKey,
        methods: &[MfaMethod],
    ) -> Result<(), MfaServiceError> {
        self.inner
            .lock()
            .unwrap()
            .lists
            .insert(cache_key(key), methods.to_vec());
        Ok(())
    }

    async fn invalidate(&self, keys: &[MethodCacheKey]) -> Result<(), MfaServiceError> {
        let mut inner = self.inner.lock().unwrap();
        for key in keys {
            let key = cache_key(key);
            inner.methods.remove(&key);
            inner.lists.remove(&key);
        }
        Ok(())
    }
}

// ── MockSettingsRepo ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockSettingsRepo {
    pub settings: Arc<Mutex<HashMap<Uuid, MfaSettings>>>,
}

impl MockSettingsRepo {
    pub fn new(entries: Vec<MfaSettings>) -> Self {
        Self {
            settings: Arc::new(Mutex::new(
                entries.into_iter().map(|s| (s.user_id, s)).collect(),
            )),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    pub fn settings_handle(&self) -> Arc<Mutex<HashMap<Uuid, MfaSettings>>> {
        Arc::clone(&self.settings)
    }
}

fn apply_patch(settings: &mut MfaSettings, patch: &SettingsPatch) {
    if let Some(v) = &patch.totp_secret {
        settings.totp_secret = v.clone();
    }
    if let Some(v) = patch.totp_enabled {
        settings.totp_enabled = v;
    }
    if let Some(v) = patch.sms_enabled {
        settings.sms_enabled = v;
    }
    if let Some(v) = &patch.sms_phone {
        settings.sms_phone = v.clone();
    }
    if let Some(v) = patch.email_enabled {
        settings.email_enabled = v;
    }
    if let Some(v) = patch.mfa_enforced {
        settings.mfa_enforced = v;
    }
    if let Some(v) = &patch.backup_codes {
        settings.backup_codes = v.clone();
    }
    if let Some(v) = &patch.backup_codes_used {
        settings.backup_codes_used = v.clone();
    }
    if let Some(v) = patch.last_used_at {
        settings.last_used_at = v;
    }
}

impl SettingsRepository for MockSettingsRepo {
    async fn find(&self, user_id: Uuid) -> Result<Option<MfaSettings>, MfaServiceError> {
        Ok(self.settings.lock().unwrap().get(&user_id).cloned())
    }

    async fn upsert(
        &self,
        user_id: Uuid,
        patch: &SettingsPatch,
    ) -> Result<(), MfaServiceError> {
        let mut settings = self.settings.lock().unwrap();
        let entry = settings
            .entry(user_id)
            .or_insert_with(|| empty_settings(user_id));
        apply_patch(entry, patch);
        entry.updated_at = Utc::now();
        Ok(())
    }

    async fn consume_backup_code(
        &self,
        user_id: Uuid,
        code: &str,
    ) -> Result<bool, MfaServiceError> {
        // Check-and-append under one lock, like the single conditional
        // UPDATE it stands in for.
        let mut settings = self.settings.lock().unwrap();
        let Some(entry) = settings.get_mut(&user_id) else {
            return Ok(false);
        };
        let code = code.to_owned();
        if !entry.backup_codes.contains(&code) || entry.backup_codes_used.contains(&code) {
            return Ok(false);
        }
        entry.backup_codes_used.push(code);
        entry.last_used_at = Some(Utc::now());
        Ok(true)
    }

    async fn touch_last_used(&self, user_id: Uuid) -> Result<(), MfaServiceError> {
        if let Some(entry) = self.settings.lock().unwrap().get_mut(&user_id) {
            entry.last_used_at = Some(Utc::now());
        }
        Ok(())
    }
}

// ── MockChallengeRepo ────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockChallengeRepo {
    pub challenges: Arc<Mutex<Vec<MfaChallenge>>>,
    pub events: Arc<Mutex<Vec<OutboxEvent>>>,
}

impl MockChallengeRepo {
    pub fn new(challenges: Vec<MfaChallenge>) -> Self {
        Self {
            challenges: Arc::new(Mutex::new(challenges)),
            events: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    pub fn events_handle(&self) -> Arc<Mutex<Vec<OutboxEvent>>> {
        Arc::clone(&self.events)
    }

    /// Code of the most recently issued challenge for a purpose.
    pub fn latest_code(&self, purpose: ChallengePurpose) -> Option<String> {
        self.challenges
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.purpose == purpose)
            .max_by_key(|c| c.created_at)
            .map(|c| c.code.clone())
    }
}

impl ChallengeRepository for MockChallengeRepo {
    async fn create_with_outbox(
        &self,
        challenge: &MfaChallenge,
        event: &OutboxEvent,
    ) -> Result<(), MfaServiceError> {
        self.challenges.lock().unwrap().push(challenge.clone());
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn find_valid(
        &self,
        user_id: Uuid,
        purpose: ChallengePurpose,
    ) -> Result<Option<MfaChallenge>, MfaServiceError> {
        Ok(self
            .challenges
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.user_id == user_id && c.purpose == purpose && c.is_valid())
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn mark_used(&self, id: Uuid) -> Result<(), MfaServiceError> {
        let mut challenges = self.challenges.lock().unwrap();
        if let Some(c) = challenges.iter_mut().find(|c| c.id == id) {
            if c.used_at.is_none() {
                c.used_at = Some(Utc::now());
            }
        }
        Ok(())
    }
}

// ── QR renderers ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MockQr;

impl QrRenderer for MockQr {
    fn render_data_url(&self, _payload: &str) -> Result<String, MfaServiceError> {
        Ok("data:image/svg+xml;base64,dGVzdA==".to_owned())
    }
}

#[derive(Clone)]
pub struct FailingQr;

impl QrRenderer for FailingQr {
    fn render_data_url(&self, _payload: &str) -> Result<String, MfaServiceError> {
        Err(MfaServiceError::QrGenerationFailed)
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────────

pub fn test_user() -> MfaUser {
    MfaUser {
        id: Uuid::parse_str("00000000-0000-0000-0000-000000000001").unwrap(),
        email: "user@example.com".to_owned(),
        mfa_enabled: false,
        mfa_method: None,
    }
}

pub fn empty_settings(user_id: Uuid) -> MfaSettings {
    let now = Utc::now();
    MfaSettings {
        user_id,
        totp_secret: None,
        totp_enabled: false,
        sms_enabled: false,
        sms_phone: None,
        email_enabled: false,
        mfa_enforced: false,
        backup_codes: vec![],
        backup_codes_used: vec![],
        last_used_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Settings with TOTP provisioned and enabled under the RFC test secret.
pub fn totp_enabled_settings(user_id: Uuid) -> MfaSettings {
    MfaSettings {
        totp_secret: Some(TEST_SECRET.to_owned()),
        totp_enabled: true,
        mfa_enforced: true,
        ..empty_settings(user_id)
    }
}

pub fn test_method(user_id: Uuid, kind: MethodKind, is_active: bool) -> MfaMethod {
    let now = Utc::now();
    MfaMethod {
        id: Uuid::new_v4(),
        user_id,
        kind,
        secret: (kind == MethodKind::Totp).then(|| TEST_SECRET.to_owned()),
        phone_number: (kind == MethodKind::Sms).then(|| "+15551234567".to_owned()),
        is_active,
        created_at: now,
        updated_at: now,
    }
}

pub fn test_challenge(user_id: Uuid, purpose: ChallengePurpose, code: &str) -> MfaChallenge {
    let now = Utc::now();
    MfaChallenge {
        id: Uuid::new_v4(),
        user_id,
        code: code.to_owned(),
        purpose,
        expires_at: now + chrono::Duration::seconds(purpose.ttl_secs()),
        used_at: None,
        created_at: now,
    }
}
