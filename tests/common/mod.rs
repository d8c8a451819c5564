#![allow(dead_code)]

use chrono::{DateTime, Duration, Utc};

use placement_core::{NewBlob, PageRequest, Role, User, UserFilter};
use placement_ports::{read_to_end, BlobStore, Storage, UserStore};

fn other(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(e.to_string())
}

/// Students created one second apart so listing order is deterministic.
pub fn staggered_students(count: usize, counsellor: Option<&str>) -> Vec<User> {
    let base = Utc::now() - Duration::hours(1);
    (0..count)
        .map(|i| {
            let mut user = User::new(format!("Student {i}"), String::new(), Role::Student);
            user.email = format!("student{i}.{}@example.test", &user.id[..8]);
            if let Some(counsellor) = counsellor {
                user = user.with_counsellor(counsellor);
            }
            user.created_at = base + Duration::seconds(i as i64);
            user.updated_at = user.created_at;
            user
        })
        .collect()
}

/// A minimal contract test suite that every `Storage` backend must satisfy.
///
/// This keeps backend parity honest (SQLx, Mongo, and any future backends).
pub async fn run_storage_contract(storage: &dyn Storage) -> Result<(), Box<dyn std::error::Error>> {
    // User roundtrip
    let counsellor = User::new(
        "Carol Counsellor".to_string(),
        "carol@example.test".to_string(),
        Role::Counsellor,
    );
    storage.insert_user(&counsellor).await.map_err(other)?;

    let fetched = storage
        .find_user(&counsellor.id)
        .await
        .map_err(other)?
        .ok_or_else(|| other("counsellor should exist"))?;
    assert_eq!(fetched.email, counsellor.email);
    assert_eq!(fetched.role, Role::Counsellor);
    assert!(storage.find_user("missing").await.map_err(other)?.is_none());

    // Uniqueness parity: same id twice, and same email under a new id, both fail.
    let dup = storage.insert_user(&counsellor).await;
    assert!(dup.is_err(), "inserting the same id twice should fail");

    let same_email = User::new(
        "Other".to_string(),
        counsellor.email.clone(),
        Role::Student,
    );
    let dup = storage.insert_user(&same_email).await;
    assert!(
        dup.as_ref().is_err_and(|e| e.is_validation()),
        "duplicate email should be a validation error, got {dup:?}"
    );

    // Listings: three students, two assigned to the counsellor.
    let mut students = staggered_students(3, None);
    students[0].profile.counsellor = Some(counsellor.id.clone());
    students[1].profile.counsellor = Some(counsellor.id.clone());
    for student in &students {
        storage.insert_user(student).await.map_err(other)?;
    }

    let all_students = UserFilter::role(Role::Student);
    let first = PageRequest::new(1, 2).map_err(other)?;
    let page = storage
        .find_users(&all_students, &first)
        .await
        .map_err(other)?;
    let ids: Vec<&str> = page.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec![students[0].id.as_str(), students[1].id.as_str()]);

    let second = PageRequest::new(2, 2).map_err(other)?;
    let page = storage
        .find_users(&all_students, &second)
        .await
        .map_err(other)?;
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, students[2].id);

    assert_eq!(storage.count_users(&all_students).await.map_err(other)?, 3);
    let mine = UserFilter::role(Role::Student).with_counsellor(counsellor.id.clone());
    assert_eq!(storage.count_users(&mine).await.map_err(other)?, 2);
    assert_eq!(
        storage
            .count_users(&UserFilter::role(Role::Admin))
            .await
            .map_err(other)?,
        0
    );

    let names = storage
        .find_names(&[counsellor.id.clone(), "missing".to_string()])
        .await
        .map_err(other)?;
    assert_eq!(names.len(), 1);
    assert_eq!(names.get(&counsellor.id), Some(&counsellor.name));
    assert!(storage.find_names(&[]).await.map_err(other)?.is_empty());

    // Counsellor assignment validates the referenced user's role.
    assert!(storage
        .assign_counsellor(&students[2].id, &counsellor.id)
        .await
        .map_err(other)?);
    assert_eq!(storage.count_users(&mine).await.map_err(other)?, 3);

    let wrong_role = storage
        .assign_counsellor(&students[2].id, &students[0].id)
        .await;
    assert!(wrong_role.is_err_and(|e| e.is_validation()));
    assert!(!storage
        .assign_counsellor("missing", &counsellor.id)
        .await
        .map_err(other)?);

    // Creation order holds below one second, including a timestamp on the whole second.
    let second_counsellor = User::new(
        "Dana Counsellor".to_string(),
        "dana@example.test".to_string(),
        Role::Counsellor,
    );
    storage.insert_user(&second_counsellor).await.map_err(other)?;
    let whole_second = DateTime::<Utc>::from_timestamp(Utc::now().timestamp() - 7200, 0)
        .ok_or_else(|| other("timestamp out of range"))?;
    let mut close = staggered_students(2, Some(&second_counsellor.id));
    close[0].created_at = whole_second;
    close[1].created_at = whole_second + Duration::milliseconds(250);
    for student in close.iter().rev() {
        storage.insert_user(student).await.map_err(other)?;
    }
    let theirs = UserFilter::role(Role::Student).with_counsellor(second_counsellor.id.clone());
    let page = storage
        .find_users(&theirs, &PageRequest::new(1, 10).map_err(other)?)
        .await
        .map_err(other)?;
    let ids: Vec<&str> = page.iter().map(|u| u.id.as_str()).collect();
    assert_eq!(ids, vec![close[0].id.as_str(), close[1].id.as_str()]);
    assert_eq!(page[0].created_at, whole_second);

    // Replace
    let mut renamed = students[0].clone();
    renamed.name = "Renamed".to_string();
    assert!(storage.replace_user(&renamed).await.map_err(other)?);
    let fetched = storage
        .find_user(&renamed.id)
        .await
        .map_err(other)?
        .ok_or_else(|| other("student should exist"))?;
    assert_eq!(fetched.name, "Renamed");
    assert_eq!(fetched.profile.counsellor.as_deref(), Some(counsellor.id.as_str()));

    let ghost = User::new("Ghost".to_string(), "ghost@example.test".to_string(), Role::Student);
    assert!(!storage.replace_user(&ghost).await.map_err(other)?);

    // Blob roundtrip spanning several download chunks.
    let data: Vec<u8> = (0..600 * 1024).map(|i| (i % 251) as u8).collect();
    let blob = NewBlob::new("avatar.png", "image/png", data.clone());
    let blob_id = storage.upload(&blob).await.map_err(other)?;
    assert!(blob_id.is_well_formed(), "blob id should be 24 hex chars: {blob_id}");

    let stream = storage
        .open_download(&blob_id)
        .await
        .map_err(other)?
        .ok_or_else(|| other("blob should exist"))?;
    assert_eq!(read_to_end(stream).await.map_err(other)?, data);

    // Avatar reference set / clear
    assert!(storage
        .set_avatar(&students[1].id, Some(&blob_id))
        .await
        .map_err(other)?);
    let with_avatar = storage
        .find_user(&students[1].id)
        .await
        .map_err(other)?
        .ok_or_else(|| other("student should exist"))?;
    assert_eq!(with_avatar.avatar(), Some(&blob_id));
    assert_eq!(with_avatar.name, students[1].name);

    assert!(storage
        .set_avatar(&students[1].id, None)
        .await
        .map_err(other)?);
    let cleared = storage
        .find_user(&students[1].id)
        .await
        .map_err(other)?
        .ok_or_else(|| other("student should exist"))?;
    assert!(cleared.avatar().is_none());
    assert!(!storage
        .set_avatar("missing", Some(&blob_id))
        .await
        .map_err(other)?);

    // Delete is idempotent from the caller's point of view.
    assert!(storage.delete(&blob_id).await.map_err(other)?);
    assert!(!storage.delete(&blob_id).await.map_err(other)?);
    assert!(storage
        .open_download(&blob_id)
        .await
        .map_err(other)?
        .is_none());

    storage.healthcheck().await.map_err(other)?;

    Ok(())
}
