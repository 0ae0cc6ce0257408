//! Database tests

use super::*;
use crate::models::*;

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};

fn new_user(db: &Database, username: &str) -> User {
    db.create_user(&NewUser {
        name: format!("{} name", username),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        password: "correct horse".to_string(),
    })
    .unwrap()
}

fn new_tx(date: &str, description: &str, amount: f64, hash: &str) -> NewTransaction {
    NewTransaction {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        description: description.to_string(),
        amount,
        transaction_type: TransactionType::Debit,
        bank: Bank::Sbi,
        import_hash: hash.to_string(),
    }
}

fn insert(db: &Database, user_id: i64, tx: &NewTransaction) -> i64 {
    match db
        .insert_transaction(user_id, tx, Category::Other, CategorySource::Fallback, None)
        .unwrap()
    {
        TransactionInsertResult::Inserted(id) => id,
        TransactionInsertResult::Duplicate(id) => panic!("unexpected duplicate {}", id),
    }
}

#[test]
fn test_in_memory_db() {
    let db = Database::in_memory().unwrap();
    assert!(db.list_users().unwrap().is_empty());
}

#[test]
fn test_in_memory_db_removed_with_last_clone() {
    let db = Database::in_memory().unwrap();
    let path = std::path::PathBuf::from(db.path());
    assert!(path.exists());

    let clone = db.clone();
    drop(db);
    assert!(path.exists());
    assert!(clone.list_users().unwrap().is_empty());

    drop(clone);
    assert!(!path.exists());
    assert!(!path.parent().unwrap().exists());
}

#[test]
fn test_create_user_and_verify() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "asha");
    assert!(user.id > 0);
    assert_eq!(user.email, "asha@example.com");
    assert_ne!(user.password_hash, "correct horse");

    let found = db.verify_credentials("ASHA", "correct horse").unwrap();
    assert_eq!(found.map(|u| u.id), Some(user.id));

    assert!(db.verify_credentials("asha", "wrong").unwrap().is_none());
    assert!(db.verify_credentials("nobody", "correct horse").unwrap().is_none());
}

#[test]
fn test_duplicate_username_and_email_rejected() {
    let db = Database::in_memory().unwrap();
    new_user(&db, "asha");

    let err = db
        .create_user(&NewUser {
            name: "Other".into(),
            username: "asha".into(),
            email: "other@example.com".into(),
            password: "password1".into(),
        })
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(ref m) if m.contains("Username")));

    let err = db
        .create_user(&NewUser {
            name: "Other".into(),
            username: "other".into(),
            email: "ASHA@example.com".into(),
            password: "password1".into(),
        })
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(ref m) if m.contains("Email")));
}

#[test]
fn test_sessions() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "ravi");

    let token = db.create_session(user.id, Duration::hours(1)).unwrap();
    assert_eq!(token.len(), 64);
    let resolved = db.get_user_by_session(&token).unwrap().unwrap();
    assert_eq!(resolved.id, user.id);

    assert!(db.get_user_by_session("not-a-token").unwrap().is_none());

    assert!(db.delete_session(&token).unwrap());
    assert!(!db.delete_session(&token).unwrap());
    assert!(db.get_user_by_session(&token).unwrap().is_none());
}

#[test]
fn test_expired_session_rejected_and_purged() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "ravi");

    let token = db.create_session(user.id, Duration::hours(-1)).unwrap();
    assert!(db.get_user_by_session(&token).unwrap().is_none());
    assert_eq!(db.purge_expired_sessions().unwrap(), 1);
}

#[test]
fn test_insert_transaction_dedup_is_per_user() {
    let db = Database::in_memory().unwrap();
    let a = new_user(&db, "a");
    let b = new_user(&db, "b");

    let tx = new_tx("2024-03-01", "SWIGGY ORDER", 250.0, "hash-1");
    let first = insert(&db, a.id, &tx);

    let again = db
        .insert_transaction(a.id, &tx, Category::Food, CategorySource::Keyword, None)
        .unwrap();
    assert_eq!(again, TransactionInsertResult::Duplicate(first));

    // Same statement row imported by a different user is not a duplicate
    insert(&db, b.id, &tx);

    assert_eq!(db.count_user_transactions(a.id).unwrap(), 1);
    assert_eq!(db.count_user_transactions(b.id).unwrap(), 1);
}

#[test]
fn test_list_transactions_date_range() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "asha");

    insert(&db, user.id, &new_tx("2024-03-15", "B", 20.0, "h2"));
    insert(&db, user.id, &new_tx("2024-03-01", "A", 10.0, "h1"));
    insert(&db, user.id, &new_tx("2024-04-01", "C", 30.0, "h3"));

    let all = db.list_user_transactions(user.id, None, None).unwrap();
    let names: Vec<_> = all.iter().map(|t| t.description.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);

    let march = db
        .list_user_transactions(
            user.id,
            NaiveDate::from_ymd_opt(2024, 3, 1),
            NaiveDate::from_ymd_opt(2024, 3, 31),
        )
        .unwrap();
    assert_eq!(march.len(), 2);

    let from_mid = db
        .list_user_transactions(user.id, NaiveDate::from_ymd_opt(2024, 3, 15), None)
        .unwrap();
    assert_eq!(from_mid.len(), 2);
    assert_eq!(from_mid[0].description, "B");
}

#[test]
fn test_update_category_scoped_to_owner() {
    let db = Database::in_memory().unwrap();
    let owner = new_user(&db, "owner");
    let other = new_user(&db, "other");

    let id = insert(&db, owner.id, &new_tx("2024-03-01", "UBER TRIP", 120.0, "h1"));

    let err = db
        .update_transaction_category(other.id, id, Category::Travel)
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    db.update_transaction_category(owner.id, id, Category::Transportation)
        .unwrap();
    let tx = db.get_transaction(owner.id, id).unwrap().unwrap();
    assert_eq!(tx.category, Category::Transportation);
    assert_eq!(tx.category_source, CategorySource::Manual);

    let labels = db.manual_category_labels(owner.id).unwrap();
    assert_eq!(labels.get(&id), Some(&Category::Transportation));
    assert!(db.manual_category_labels(other.id).unwrap().is_empty());
    assert!(db.get_transaction(other.id, id).unwrap().is_none());
}

#[test]
fn test_set_recurring_flags_replaces_previous() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "asha");
    let a = insert(&db, user.id, &new_tx("2024-01-05", "NETFLIX", 499.0, "h1"));
    let b = insert(&db, user.id, &new_tx("2024-02-05", "NETFLIX", 499.0, "h2"));

    let flagged = db
        .set_recurring_flags(user.id, &HashSet::from([a, b]))
        .unwrap();
    assert_eq!(flagged, 2);

    db.set_recurring_flags(user.id, &HashSet::from([b])).unwrap();
    let txs = db.list_user_transactions(user.id, None, None).unwrap();
    assert!(!txs[0].is_recurring);
    assert!(txs[1].is_recurring);
}

#[test]
fn test_category_rules_crud() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "asha");
    let other = new_user(&db, "other");

    let low = db
        .create_category_rule(user.id, "zomato", PatternType::Contains, Category::Food, 0)
        .unwrap();
    let high = db
        .create_category_rule(user.id, "^RENT", PatternType::Regex, Category::Housing, 10)
        .unwrap();

    let rules = db.list_category_rules(user.id).unwrap();
    assert_eq!(rules.iter().map(|r| r.id).collect::<Vec<_>>(), vec![high, low]);
    assert!(db.list_category_rules(other.id).unwrap().is_empty());

    assert!(matches!(
        db.delete_category_rule(other.id, low),
        Err(Error::NotFound(_))
    ));
    db.delete_category_rule(user.id, low).unwrap();
    assert_eq!(db.list_category_rules(user.id).unwrap().len(), 1);
}

#[test]
fn test_category_rule_validation() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "asha");

    assert!(matches!(
        db.create_category_rule(user.id, "  ", PatternType::Contains, Category::Food, 0),
        Err(Error::InvalidData(_))
    ));
    assert!(matches!(
        db.create_category_rule(user.id, "([unclosed", PatternType::Regex, Category::Food, 0),
        Err(Error::Regex(_))
    ));
}

#[test]
fn test_import_sessions() {
    let db = Database::in_memory().unwrap();
    let user = new_user(&db, "asha");

    let id = db
        .create_import_session(&NewImportSession {
            user_id: user.id,
            filename: Some("march.csv".into()),
            bank: Bank::Hdfc,
            format: StatementFormat::Csv,
            file_size_bytes: Some(2048),
        })
        .unwrap();
    db.update_import_session_results(id, 12, 3).unwrap();

    let session = db.get_import_session(user.id, id).unwrap().unwrap();
    assert_eq!(session.bank, Bank::Hdfc);
    assert_eq!(session.imported_count, 12);
    assert_eq!(session.skipped_count, 3);

    let sessions = db.list_import_sessions(user.id, 10).unwrap();
    assert_eq!(sessions.len(), 1);

    let other = new_user(&db, "other");
    assert!(db.get_import_session(other.id, id).unwrap().is_none());
}

#[test]
fn test_audit_log() {
    let db = Database::in_memory().unwrap();
    db.log_audit("asha", "login", Some("user"), Some(1), None)
        .unwrap();
    db.log_audit("asha", "upload", Some("import_session"), Some(7), Some("3 imported"))
        .unwrap();

    let entries = db.list_audit_log(10).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].action, "upload");
    assert_eq!(entries[0].details.as_deref(), Some("3 imported"));

    assert_eq!(db.list_audit_log(1).unwrap().len(), 1);
}

#[test]
fn test_key_derivation_is_deterministic() {
    let key1 = derive_key("my-secret").unwrap();
    let key2 = derive_key("my-secret").unwrap();
    assert_eq!(key1, key2);

    let key3 = derive_key("other-secret").unwrap();
    assert_ne!(key1, key3);
}

#[test]
fn test_encrypted_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("encrypted.db");
    let path = path.to_str().unwrap();

    {
        let db = Database::new_with_key(path, Some("test-passphrase")).unwrap();
        new_user(&db, "asha");
    }

    {
        let db = Database::new_with_key(path, Some("test-passphrase")).unwrap();
        assert_eq!(db.list_users().unwrap().len(), 1);
    }

    assert!(
        Database::new_with_key(path, None).is_err(),
        "Should fail to open encrypted db without key"
    );
    assert!(
        Database::new_with_key(path, Some("wrong-passphrase")).is_err(),
        "Should fail to open encrypted db with wrong key"
    );
}

#[test]
fn test_encryption_required_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("required.db");
    let path = path.to_str().unwrap();

    std::env::remove_var(DB_KEY_ENV);

    let err = match Database::new(path) {
        Err(e) => e.to_string(),
        Ok(_) => panic!("Expected error"),
    };
    assert!(err.contains(DB_KEY_ENV), "Error should mention key: {}", err);

    assert!(Database::new_unencrypted(path).is_ok());
}
