#![allow(dead_code)]

use accessmap::{
    AppConfig, AppState, MockPredictor, create_router,
    models::{
        CommentAuthor, Node, NodeAccessibility, NodeAccessibilityProposition, NodeComment, User,
        UserCredentials, UserDisability, UserRole,
    },
    repository::{Repository, RepositoryError},
};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, Mutex},
};
use tower::util::ServiceExt;

// --- In-memory Repository ---

struct StoredUser {
    id: i32,
    email: String,
    pwd_hash: String,
    role: UserRole,
    disabilities: Vec<UserDisability>,
}

struct StoredComment {
    id: i32,
    osm_id: String,
    user_id: i32,
    text: String,
    created_at: DateTime<Utc>,
}

struct StoredProposition {
    id: i32,
    osm_id: String,
    user_id: i32,
    text: String,
    accessibility: NodeAccessibility,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    next_id: i32,
    users: Vec<StoredUser>,
    comments: Vec<StoredComment>,
    propositions: Vec<StoredProposition>,
    nodes: BTreeMap<String, Option<NodeAccessibility>>,
}

impl Store {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn author(&self, user_id: i32) -> CommentAuthor {
        let user = self
            .users
            .iter()
            .find(|u| u.id == user_id)
            .expect("comment author must exist");
        CommentAuthor {
            id: user.id,
            email: user.email.clone(),
            disabilities: user.disabilities.clone(),
        }
    }

    /// Same shape as the SQL listing: union of the three sources, newest first.
    fn build_node(&self, osm_id: &str) -> Node {
        let mut comments: Vec<NodeComment> = self
            .comments
            .iter()
            .filter(|c| c.osm_id == osm_id)
            .map(|c| NodeComment {
                id: c.id,
                user: self.author(c.user_id),
                text: c.text.clone(),
                created_at: c.created_at,
            })
            .collect();
        comments.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let mut propositions: Vec<NodeAccessibilityProposition> = self
            .propositions
            .iter()
            .filter(|p| p.osm_id == osm_id)
            .map(|p| NodeAccessibilityProposition {
                id: p.id,
                user: self.author(p.user_id),
                accessibility: p.accessibility,
                text: p.text.clone(),
                created_at: p.created_at,
            })
            .collect();
        propositions.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        Node {
            osm_id: osm_id.to_string(),
            accessibility: self.nodes.get(osm_id).copied().flatten(),
            comments,
            accessibility_propositions: propositions,
        }
    }

    fn known_osm_ids(&self) -> BTreeSet<String> {
        self.nodes
            .keys()
            .cloned()
            .chain(self.comments.iter().map(|c| c.osm_id.clone()))
            .chain(self.propositions.iter().map(|p| p.osm_id.clone()))
            .collect()
    }
}

/// InMemoryRepository
///
/// Test double with the same observable semantics as `PostgresRepository`:
/// unique emails, owner-scoped deletes, upserts and the union-style node listing.
#[derive(Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
}

impl InMemoryRepository {
    pub fn set_role(&self, user_id: i32, role: UserRole) {
        let mut store = self.store.lock().unwrap();
        if let Some(user) = store.users.iter_mut().find(|u| u.id == user_id) {
            user.role = role;
        }
    }

    pub fn remove_user(&self, user_id: i32) {
        let mut store = self.store.lock().unwrap();
        store.users.retain(|u| u.id != user_id);
        store.comments.retain(|c| c.user_id != user_id);
        store.propositions.retain(|p| p.user_id != user_id);
    }

    pub fn user_count(&self) -> usize {
        self.store.lock().unwrap().users.len()
    }

    pub fn comment_ids(&self) -> Vec<i32> {
        self.store.lock().unwrap().comments.iter().map(|c| c.id).collect()
    }

    pub fn proposition_ids(&self) -> Vec<i32> {
        self.store
            .lock()
            .unwrap()
            .propositions
            .iter()
            .map(|p| p.id)
            .collect()
    }

    /// Value of the `nodes` row itself (`None` when the row does not exist).
    pub fn node_row(&self, osm_id: &str) -> Option<Option<NodeAccessibility>> {
        self.store.lock().unwrap().nodes.get(osm_id).copied()
    }

    pub fn insert_node_row(&self, osm_id: &str, accessibility: Option<NodeAccessibility>) {
        self.store
            .lock()
            .unwrap()
            .nodes
            .insert(osm_id.to_string(), accessibility);
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(
        &self,
        email: &str,
        pwd_hash: &str,
        disabilities: &[UserDisability],
    ) -> Result<i32, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        if store.users.iter().any(|u| u.email == email) {
            return Err(RepositoryError::Conflict);
        }
        let id = store.next_id();
        store.users.push(StoredUser {
            id,
            email: email.to_string(),
            pwd_hash: pwd_hash.to_string(),
            role: UserRole::User,
            disabilities: disabilities.to_vec(),
        });
        Ok(id)
    }

    async fn get_user(&self, id: i32) -> Result<Option<User>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().find(|u| u.id == id).map(|u| User {
            id: u.id,
            email: u.email.clone(),
            role: u.role,
            disabilities: u.disabilities.clone(),
        }))
    }

    async fn get_user_credentials(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| UserCredentials {
                id: u.id,
                email: u.email.clone(),
                pwd_hash: u.pwd_hash.clone(),
            }))
    }

    async fn create_comment(
        &self,
        osm_id: &str,
        user_id: i32,
        text: &str,
    ) -> Result<i32, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let id = store.next_id();
        store.comments.push(StoredComment {
            id,
            osm_id: osm_id.to_string(),
            user_id,
            text: text.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn delete_comment(&self, id: i32, user_id: i32) -> Result<u64, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let before = store.comments.len();
        store
            .comments
            .retain(|c| !(c.id == id && c.user_id == user_id));
        Ok((before - store.comments.len()) as u64)
    }

    async fn upsert_node(
        &self,
        osm_id: &str,
        accessibility: NodeAccessibility,
    ) -> Result<(), RepositoryError> {
        self.insert_node_row(osm_id, Some(accessibility));
        Ok(())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .known_osm_ids()
            .iter()
            .map(|osm_id| store.build_node(osm_id))
            .collect())
    }

    async fn get_node(&self, osm_id: &str) -> Result<Option<Node>, RepositoryError> {
        let store = self.store.lock().unwrap();
        Ok(store
            .known_osm_ids()
            .contains(osm_id)
            .then(|| store.build_node(osm_id)))
    }

    async fn create_proposition(
        &self,
        osm_id: &str,
        user_id: i32,
        text: &str,
        accessibility: NodeAccessibility,
    ) -> Result<i32, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let id = store.next_id();
        store.propositions.push(StoredProposition {
            id,
            osm_id: osm_id.to_string(),
            user_id,
            text: text.to_string(),
            accessibility,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn delete_proposition(&self, id: i32, user_id: i32) -> Result<u64, RepositoryError> {
        let mut store = self.store.lock().unwrap();
        let before = store.propositions.len();
        store
            .propositions
            .retain(|p| !(p.id == id && p.user_id == user_id));
        Ok((before - store.propositions.len()) as u64)
    }
}

// --- Test App ---

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<InMemoryRepository>,
    pub predictor: MockPredictor,
    pub config: AppConfig,
}

pub fn test_state(repo: Arc<InMemoryRepository>, predictor: MockPredictor) -> AppState {
    AppState {
        repo,
        predictor: Arc::new(predictor),
        config: AppConfig::default(),
    }
}

pub fn spawn_app(predictor: MockPredictor) -> TestApp {
    let repo = Arc::new(InMemoryRepository::default());
    let state = test_state(repo.clone(), predictor.clone());
    let config = state.config.clone();

    TestApp {
        router: create_router(state),
        repo,
        predictor,
        config,
    }
}

impl TestApp {
    /// Sends one request through the full router. Empty bodies come back as `Value::Null`,
    /// non-JSON bodies as `Value::String`.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    /// Registers `email` with password `secret` and logs in. Returns (user_id, token).
    pub async fn register_and_login(&self, email: &str, disabilities: Value) -> (i32, String) {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/register",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": "secret",
                    "disabilities": disabilities,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let user_id = body["user_id"].as_i64().unwrap() as i32;

        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": "secret" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");

        (user_id, body["token"].as_str().unwrap().to_string())
    }
}
