use bilten_mfa::domain::methods::MethodStore;
use bilten_mfa::domain::otp::{time_counter, totp};
use bilten_mfa::domain::types::{ChallengePurpose, MethodKind};
use bilten_mfa::error::MfaServiceError;
use bilten_mfa::usecase::status::{
    AvailableMethodsUseCase, IsMfaEnabledUseCase, MfaStatusUseCase,
};
use bilten_mfa::usecase::validate::{ValidateMfaCodeInput, ValidateMfaCodeUseCase};

use crate::helpers::{
    MockChallengeRepo, MockMethodRepo, MockSettingsRepo, NullMethodCache, TEST_SECRET,
    empty_settings, test_challenge, test_method, test_user, totp_enabled_settings,
};

const NOW: u64 = 1_700_000_000;

fn input(user_id: uuid::Uuid, method: &str, code: &str) -> ValidateMfaCodeInput {
    ValidateMfaCodeInput {
        user_id,
        method: method.to_owned(),
        code: code.to_owned(),
    }
}

#[tokio::test]
async fn should_dispatch_totp_and_report_result() {
    let user = test_user();
    let validate = ValidateMfaCodeUseCase {
        settings: MockSettingsRepo::new(vec![totp_enabled_settings(user.id)]),
        challenges: MockChallengeRepo::empty(),
    };

    let token = totp(TEST_SECRET, time_counter(NOW)).unwrap();
    let output = validate
        .execute_at(input(user.id, "totp", &token), NOW)
        .await
        .unwrap();
    assert!(output.success);
    assert_eq!(output.method, "totp");
    assert_eq!(output.message, "Verification successful");

    let output = validate
        .execute_at(input(user.id, "totp", "000000"), NOW)
        .await
        .unwrap();
    assert!(!output.success);
    assert_eq!(output.message, "Invalid or expired code");
}

#[tokio::test]
async fn should_lowercase_method_name_and_label_backup_codes() {
    let user = test_user();
    let settings = {
        let mut s = empty_settings(user.id);
        s.backup_codes = vec!["CODE1234".to_owned()];
        MockSettingsRepo::new(vec![s])
    };
    let validate = ValidateMfaCodeUseCase {
        settings,
        challenges: MockChallengeRepo::empty(),
    };

    let output = validate
        .execute_at(input(user.id, "BACKUP", "CODE1234"), NOW)
        .await
        .unwrap();
    assert!(output.success);
    assert_eq!(output.method, "backup_code");

    // The dispatch consumed the code.
    let output = validate
        .execute_at(input(user.id, "backup", "CODE1234"), NOW)
        .await
        .unwrap();
    assert!(!output.success);
}

#[tokio::test]
async fn should_dispatch_sms_and_consume_challenge() {
    let user = test_user();
    let validate = ValidateMfaCodeUseCase {
        settings: MockSettingsRepo::new(vec![empty_settings(user.id)]),
        challenges: MockChallengeRepo::new(vec![test_challenge(
            user.id,
            ChallengePurpose::SmsMfa,
            "654321",
        )]),
    };

    let output = validate
        .execute_at(input(user.id, "sms", "654321"), NOW)
        .await
        .unwrap();
    assert!(output.success);
    assert_eq!(output.method, "sms");

    let output = validate
        .execute_at(input(user.id, "sms", "654321"), NOW)
        .await
        .unwrap();
    assert!(!output.success, "challenge codes are single-use");
}

#[tokio::test]
async fn should_error_on_unsupported_method() {
    let user = test_user();
    let validate = ValidateMfaCodeUseCase {
        settings: MockSettingsRepo::empty(),
        challenges: MockChallengeRepo::empty(),
    };
    let result = validate
        .execute_at(input(user.id, "push", "123456"), NOW)
        .await;
    assert!(
        matches!(result, Err(MfaServiceError::UnsupportedMethod)),
        "expected UnsupportedMethod, got {result:?}"
    );
}

#[tokio::test]
async fn should_count_backup_codes_as_available_method() {
    let user = test_user();
    // Every code spent: the batch still exists, so backup stays available
    // until a regeneration replaces it.
    let settings = {
        let mut s = empty_settings(user.id);
        s.backup_codes = vec!["CODE1234".to_owned(), "CODE5678".to_owned()];
        s.backup_codes_used = vec!["CODE1234".to_owned(), "CODE5678".to_owned()];
        MockSettingsRepo::new(vec![s])
    };
    let available = AvailableMethodsUseCase {
        settings,
        methods: MethodStore::new(MockMethodRepo::empty(), NullMethodCache),
    };

    let output = available.execute(user.id).await.unwrap();
    assert!(!output.methods.totp);
    assert!(!output.methods.sms);
    assert!(!output.methods.email);
    assert!(output.methods.backup, "a provisioned batch counts");
    assert!(output.has_any_method);
    assert_eq!(output.active_method_count, 0);
}

#[tokio::test]
async fn should_report_no_methods_without_backup_batch() {
    let user = test_user();
    let available = AvailableMethodsUseCase {
        settings: MockSettingsRepo::new(vec![empty_settings(user.id)]),
        methods: MethodStore::new(MockMethodRepo::empty(), NullMethodCache),
    };

    let output = available.execute(user.id).await.unwrap();
    assert!(!output.methods.backup);
    assert!(!output.has_any_method);
}

#[tokio::test]
async fn should_fall_back_to_settings_flags_for_enablement() {
    let user = test_user();

    // No records at all, but the flag says SMS: drift resolves to enabled.
    let enabled = IsMfaEnabledUseCase {
        settings: {
            let mut s = empty_settings(user.id);
            s.sms_enabled = true;
            MockSettingsRepo::new(vec![s])
        },
        methods: MethodStore::new(MockMethodRepo::empty(), NullMethodCache),
    };
    assert!(enabled.execute(user.id).await.unwrap());

    // Neither records nor flags.
    let enabled = IsMfaEnabledUseCase {
        settings: MockSettingsRepo::new(vec![empty_settings(user.id)]),
        methods: MethodStore::new(MockMethodRepo::empty(), NullMethodCache),
    };
    assert!(!enabled.execute(user.id).await.unwrap());

    // An active record wins regardless of flags.
    let enabled = IsMfaEnabledUseCase {
        settings: MockSettingsRepo::empty(),
        methods: MethodStore::new(
            MockMethodRepo::new(vec![test_method(user.id, MethodKind::Totp, true)]),
            NullMethodCache,
        ),
    };
    assert!(enabled.execute(user.id).await.unwrap());
}

#[tokio::test]
async fn should_assemble_full_status() {
    let user = test_user();
    let settings = {
        let mut s = totp_enabled_settings(user.id);
        s.backup_codes = vec!["A".to_owned(), "B".to_owned(), "C".to_owned()];
        s.backup_codes_used = vec!["A".to_owned()];
        MockSettingsRepo::new(vec![s])
    };
    let status = MfaStatusUseCase {
        settings,
        methods: MethodStore::new(
            MockMethodRepo::new(vec![
                test_method(user.id, MethodKind::Totp, true),
                test_method(user.id, MethodKind::Email, false),
            ]),
            NullMethodCache,
        ),
    };

    let output = status.execute(user.id).await.unwrap();
    assert!(output.enabled);
    assert!(output.totp_enabled);
    assert!(!output.sms_enabled);
    assert!(output.mfa_enforced);
    assert_eq!(output.active_methods, vec![MethodKind::Totp]);
    assert_eq!(output.backup_codes_remaining, 2);
    assert_eq!(output.backup_codes_used, 1);
    assert_eq!(output.stats.total_methods, 2);
    assert_eq!(output.stats.active_methods, 1);
    assert!(!output.stats.has_email, "inactive email record is not live");
}
