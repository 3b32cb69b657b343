use bilten_mfa::usecase::backup::{RegenerateBackupCodesUseCase, VerifyBackupCodeUseCase};

use crate::helpers::{MockSettingsRepo, empty_settings, test_user};

#[tokio::test]
async fn should_consume_each_backup_code_exactly_once() {
    let user = test_user();
    let mut settings = empty_settings(user.id);
    settings.backup_codes = vec!["CODE1234".to_owned(), "CODE5678".to_owned()];
    let repo = MockSettingsRepo::new(vec![settings]);

    let verify = VerifyBackupCodeUseCase {
        settings: repo.clone(),
    };

    assert!(verify.execute(user.id, "CODE1234").await.unwrap());
    assert!(
        !verify.execute(user.id, "CODE1234").await.unwrap(),
        "a spent code must not verify again"
    );
    assert!(verify.execute(user.id, "CODE5678").await.unwrap());
    assert!(!verify.execute(user.id, "WRONG999").await.unwrap());

    let stored = repo.settings_handle();
    let stored = stored.lock().unwrap();
    let entry = stored.get(&user.id).unwrap();
    assert_eq!(entry.backup_codes_used, vec!["CODE1234", "CODE5678"]);
    assert!(entry.last_used_at.is_some());
}

#[tokio::test]
async fn should_return_false_when_user_has_no_settings() {
    let user = test_user();
    let verify = VerifyBackupCodeUseCase {
        settings: MockSettingsRepo::empty(),
    };
    assert!(!verify.execute(user.id, "CODE1234").await.unwrap());
}

#[tokio::test]
async fn should_invalidate_old_codes_on_regeneration() {
    let user = test_user();
    let mut settings = empty_settings(user.id);
    settings.backup_codes = vec!["CODE1234".to_owned()];
    settings.backup_codes_used = vec!["CODE1234".to_owned()];
    let repo = MockSettingsRepo::new(vec![settings]);

    let regenerate = RegenerateBackupCodesUseCase {
        settings: repo.clone(),
    };
    let codes = regenerate.execute(user.id).await.unwrap();

    assert_eq!(codes.len(), 10);
    assert!(codes.iter().all(|c| c.len() == 16), "8 bytes hex-encode to 16 chars");

    let verify = VerifyBackupCodeUseCase {
        settings: repo.clone(),
    };
    assert!(
        !verify.execute(user.id, "CODE1234").await.unwrap(),
        "codes from the old batch are dead"
    );
    assert!(
        verify.execute(user.id, &codes[0]).await.unwrap(),
        "fresh batch verifies, used set was reset"
    );
}
