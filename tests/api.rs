use std::io::Read;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use pentyflix::api::{self, ApiError, Client, ClientConfig, RegisterRequest};
use pentyflix::browser::{Limit, TimeFrame};
use pentyflix::data::{ApiAuthService, ApiChannelService, ApiMediaService, ChannelService, MediaService};
use pentyflix::session::{Manager, SessionError};
use pentyflix::storage::Store;
use tiny_http::{Header, Response, Server};

#[derive(Debug)]
struct Seen {
    method: String,
    url: String,
    body: String,
}

/// Serves one canned JSON reply per entry in `replies`, in order.
fn stub(replies: Vec<(u16, &'static str)>) -> (String, Receiver<Seen>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for (status, body) in replies {
            let Ok(mut request) = server.recv() else {
                return;
            };
            let mut received = String::new();
            let _ = request.as_reader().read_to_string(&mut received);
            let _ = tx.send(Seen {
                method: request.method().to_string(),
                url: request.url().to_string(),
                body: received,
            });
            let header = Header::from_bytes("Content-Type", "application/json").unwrap();
            let response = Response::from_string(body)
                .with_status_code(status)
                .with_header(header);
            let _ = request.respond(response);
        }
    });
    (format!("http://{addr}/api"), rx)
}

fn client(base_url: &str) -> Arc<Client> {
    Arc::new(
        Client::new(ClientConfig {
            base_url: base_url.to_string(),
            ..ClientConfig::default()
        })
        .unwrap(),
    )
}

#[test]
fn login_posts_credentials_and_decodes_user() {
    let (base, seen) = stub(vec![(
        200,
        r#"{"token":"abc","user":{"userName":"grace","email":"grace@example.com","firstName":"Grace"}}"#,
    )]);
    let response = client(&base).login("grace", "hunter22").unwrap();
    assert_eq!(response.token, "abc");
    assert_eq!(response.user.user_name, "grace");
    assert_eq!(response.user.first_name.as_deref(), Some("Grace"));

    let request = seen.recv().unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "/api/Auth/login");
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body["username"], "grace");
    assert_eq!(body["password"], "hunter22");
}

#[test]
fn rejected_login_surfaces_server_message_and_persists_nothing() {
    let (base, _seen) = stub(vec![(401, r#"{"message":"Invalid credentials"}"#)]);
    let store = Arc::new(Store::open_in_memory().unwrap());
    let manager = Manager::new(store.clone(), Arc::new(ApiAuthService::new(client(&base))));

    match manager.login("grace", "wrong") {
        Err(SessionError::Rejected(message)) => assert_eq!(message, "Invalid credentials"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(!manager.is_authenticated());
    assert_eq!(manager.error().as_deref(), Some("Invalid credentials"));
    assert!(store.get("token").unwrap().is_none());
}

#[test]
fn error_without_message_uses_generic_text() {
    let (base, _seen) = stub(vec![(500, "oops")]);
    let store = Arc::new(Store::open_in_memory().unwrap());
    let manager = Manager::new(store, Arc::new(ApiAuthService::new(client(&base))));
    let err = manager.login("grace", "pw").unwrap_err();
    assert_eq!(err.to_string(), pentyflix::session::LOGIN_FAILED_MESSAGE);
}

#[test]
fn register_sends_optional_names_only_when_present() {
    let (base, seen) = stub(vec![(200, "")]);
    let request = RegisterRequest {
        username: "neo".into(),
        email: "neo@example.com".into(),
        password: "password1".into(),
        first_name: Some("Thomas".into()),
        last_name: None,
    };
    client(&base).register(&request).unwrap();

    let sent = seen.recv().unwrap();
    assert_eq!(sent.url, "/api/Auth/register");
    let body: serde_json::Value = serde_json::from_str(&sent.body).unwrap();
    assert_eq!(body["firstName"], "Thomas");
    assert!(body.get("lastName").is_none());
}

#[test]
fn non_array_list_response_is_unexpected_shape() {
    let (base, _seen) = stub(vec![(200, r#"{"items":[]}"#)]);
    let service = ApiChannelService::new(client(&base), 25);
    let err = service.popular_channels().unwrap_err();
    assert!(api::is_unexpected_shape(&err));
}

#[test]
fn keyword_search_sends_query_and_limit() {
    let (base, seen) = stub(vec![(
        200,
        r#"[{"name":"moviesuggestions","displayName":"MovieSuggestions","subscriberCount":1200}]"#,
    )]);
    let service = ApiChannelService::new(client(&base), 15);
    let channels = service.channels_for_keyword("sci fi").unwrap();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].handle(), "MovieSuggestions");
    assert_eq!(channels[0].subscriber_count, 1200);

    let request = seen.recv().unwrap();
    assert_eq!(request.method, "GET");
    assert_eq!(
        request.url,
        "/api/reddit/Category/search?query=sci+fi&limit=15"
    );
}

#[test]
fn keywords_decode_as_strings() {
    let (base, seen) = stub(vec![(200, r#"["cinema","anime"]"#)]);
    let service = ApiChannelService::new(client(&base), 25);
    assert_eq!(service.keywords().unwrap(), vec!["cinema", "anime"]);
    assert_eq!(seen.recv().unwrap().url, "/api/NsfwKeywords");
}

#[test]
fn subreddit_media_uses_path_and_filters() {
    let (base, seen) = stub(vec![(
        200,
        r#"[{"title":"Sunset","author":"ansel","url":"https://i.example.com/a.jpg","score":42,"created_utc":1700000000,"isVideo":false,"mediaType":"image"}]"#,
    )]);
    let service = ApiMediaService::new(client(&base));
    let posts = service
        .subreddit_media("r/EarthPorn", Limit::Fifty, TimeFrame::Week)
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].score, 42);
    assert_eq!(posts[0].created_utc.as_deref(), Some("1700000000"));

    let request = seen.recv().unwrap();
    assert_eq!(
        request.url,
        "/api/Reddit/media/EarthPorn?limit=50&timeFrame=week"
    );
}

#[test]
fn media_search_status_error_keeps_server_message() {
    let (base, _seen) = stub(vec![(400, r#"{"message":"Query too short"}"#)]);
    let err = client(&base).search_media("a").unwrap_err();
    assert_eq!(err.server_message(), Some("Query too short"));
    assert!(matches!(err, ApiError::Status { status: 400, .. }));
}
