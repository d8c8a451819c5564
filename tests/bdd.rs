// Behaviour tests for the listing and profile-update rules.

use cucumber::{given, then, when, World};
use serde_json::{Map, Value};

use placement_core::{
    ListingMeta, PageRequest, PlacementError, ProfileUpdate, Role, User, UserFilter,
};

const DEFAULT_PAGE_SIZE: u64 = 10;

#[derive(Debug, Default, World)]
pub struct PlacementWorld {
    users: Vec<User>,
    page: Option<Result<PageRequest, PlacementError>>,
    subject: Option<User>,
    outcome: Option<Result<User, PlacementError>>,
}

impl PlacementWorld {
    fn students(&self) -> Vec<&User> {
        let filter = UserFilter::role(Role::Student);
        let mut students: Vec<&User> = self.users.iter().filter(|u| filter.matches(u)).collect();
        students.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        students
    }

    fn resolved_page(&self) -> PageRequest {
        match &self.page {
            Some(Ok(page)) => *page,
            other => panic!("expected a valid page request, got {other:?}"),
        }
    }

    fn current_page(&self) -> Vec<&User> {
        let page = self.resolved_page();
        self.students()
            .into_iter()
            .skip(page.skip() as usize)
            .take(page.limit as usize)
            .collect()
    }

    fn subject(&self) -> &User {
        self.subject.as_ref().expect("a subject user")
    }
}

#[given(expr = "{int} students exist")]
fn students_exist(world: &mut PlacementWorld, count: usize) {
    let base = chrono::Utc::now() - chrono::Duration::hours(1);
    for i in 0..count {
        let mut user = User::new(
            format!("Student {i}"),
            format!("student{i}@example.test"),
            Role::Student,
        );
        user.created_at = base + chrono::Duration::seconds(i as i64);
        world.users.push(user);
    }
    world.users.push(User::new(
        "Carol".to_string(),
        "carol@example.test".to_string(),
        Role::Counsellor,
    ));
}

#[when(regex = r#"^a listing is requested with page "([^"]*)" and limit "([^"]*)"$"#)]
fn listing_requested(world: &mut PlacementWorld, page: String, limit: String) {
    world.page = Some(PageRequest::from_query(
        Some(&page),
        Some(&limit),
        DEFAULT_PAGE_SIZE,
    ));
}

#[when("a listing is requested without parameters")]
fn listing_requested_with_defaults(world: &mut PlacementWorld) {
    world.page = Some(PageRequest::from_query(None, None, DEFAULT_PAGE_SIZE));
}

#[then(expr = "the page holds {int} students")]
fn page_holds(world: &mut PlacementWorld, expected: usize) {
    let page = world.current_page();
    assert_eq!(page.len(), expected);
    assert!(page.iter().all(|u| u.role == Role::Student));
}

#[then(expr = "the listing reports {int} total students over {int} pages")]
fn listing_reports(world: &mut PlacementWorld, total: u64, pages: u64) {
    let counted = world.students().len() as u64;
    let meta = ListingMeta::new(counted, &world.resolved_page());
    assert_eq!(meta.total_students, total);
    assert_eq!(meta.total_pages, pages);
}

#[then(expr = "the page size is {int}")]
fn page_size_is(world: &mut PlacementWorld, limit: u64) {
    assert_eq!(world.resolved_page().limit, limit);
}

#[then("the request is rejected as invalid")]
fn request_rejected(world: &mut PlacementWorld) {
    match &world.page {
        Some(Err(err)) => assert!(err.is_validation(), "unexpected error {err}"),
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[given(regex = r#"^a student named "([^"]*)"$"#)]
fn a_student_named(world: &mut PlacementWorld, name: String) {
    world.subject = Some(User::new(
        name,
        "subject@example.test".to_string(),
        Role::Student,
    ));
}

#[when(regex = r"^they submit the update (\{.*\})$")]
fn submit_update(world: &mut PlacementWorld, body: String) {
    let changes: Map<String, Value> = serde_json::from_str(&body).expect("update body is a JSON object");
    let outcome = ProfileUpdate::from_map(changes).and_then(|update| update.apply(world.subject()));
    if let Ok(updated) = &outcome {
        world.subject = Some(updated.clone());
    }
    world.outcome = Some(outcome);
}

#[then("the update is accepted")]
fn update_accepted(world: &mut PlacementWorld) {
    match &world.outcome {
        Some(Ok(_)) => {}
        other => panic!("expected the update to succeed, got {other:?}"),
    }
}

#[then(regex = r#"^the update is rejected mentioning "([^"]*)"$"#)]
fn update_rejected(world: &mut PlacementWorld, needle: String) {
    match &world.outcome {
        Some(Err(err)) => {
            assert!(err.is_validation(), "unexpected error {err}");
            assert!(err.message.contains(&needle), "{}", err.message);
        }
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[then(regex = r#"^their name is "([^"]*)"$"#)]
fn name_is(world: &mut PlacementWorld, name: String) {
    assert_eq!(world.subject().name, name);
}

#[then(regex = r#"^their phone is "([^"]*)"$"#)]
fn phone_is(world: &mut PlacementWorld, phone: String) {
    assert_eq!(world.subject().profile.phone.as_deref(), Some(phone.as_str()));
}

#[then("they have no avatar")]
fn no_avatar(world: &mut PlacementWorld) {
    assert!(world.subject().avatar().is_none());
}

#[tokio::main]
async fn main() {
    PlacementWorld::run("tests/features").await;
}
