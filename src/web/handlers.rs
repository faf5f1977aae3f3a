use std::collections::HashMap;
use std::sync::MutexGuard;

use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use serde_json::json;
use tera::Context;
use tokio::time::Instant;
use uuid::Uuid;

use crate::chat::{ChatSession, ValidationError, QUICK_QUESTIONS};
use crate::data::i18n::Language;
use crate::data::water::WaterStatus;
use crate::web::models::{
    ChatRequest, ChatResponse, CityReport, CitySummary, DraftRequest, LangQuery, SearchQuery,
    ValidationResponse,
};
use crate::AppState;

type Sessions<'a> = MutexGuard<'a, HashMap<Uuid, ChatSession>>;

fn lock_sessions(data: &AppState) -> Result<Sessions<'_>, HttpResponse> {
    data.sessions.lock().map_err(|e| {
        error!("Failed to lock sessions mutex: {}", e);
        internal_error()
    })
}

fn internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(json!({
        "error": "Internal server error"
    }))
}

// Drops sessions idle past their TTL; run whenever a new session is created
fn evict_idle(sessions: &mut HashMap<Uuid, ChatSession>, now: Instant) {
    let before = sessions.len();
    sessions.retain(|_, session| !session.is_idle_at(now));
    let evicted = before - sessions.len();
    if evicted > 0 {
        info!("Evicted {} idle chat sessions", evicted);
    }
}

fn session_not_found(id: Uuid) -> HttpResponse {
    HttpResponse::NotFound().json(json!({ "error": format!("Unknown chat session {}", id) }))
}

fn language(raw: Option<&str>) -> Language {
    raw.and_then(|code| code.parse().ok()).unwrap_or_default()
}

// Localized validation message, falling back to the built-in English text
fn validation_message(data: &AppState, lang: Language, err: &ValidationError) -> String {
    let translated = data.translations.t(lang, err.key());
    if translated == err.key() {
        return err.to_string();
    }
    match err {
        ValidationError::OverLimit { limit } => translated.replace("{limit}", &limit.to_string()),
        ValidationError::Cooldown { remaining_secs } => {
            translated.replace("{seconds}", &remaining_secs.to_string())
        }
        _ => translated.to_string(),
    }
}

// Index page handler
pub async fn index(data: web::Data<AppState>, query: web::Query<LangQuery>) -> impl Responder {
    let lang = language(query.lang.as_deref());
    let t = |key: &'static str| data.translations.t(lang, key);

    let mut context = Context::new();
    context.insert("lang", lang.code());
    context.insert("title", t("navbar.chatbot"));
    context.insert("placeholder", t("chatbot.placeholder"));
    context.insert("send_label", t("chatbot.sendMessage"));
    context.insert("quick_questions", &QUICK_QUESTIONS);
    context.insert("character_limit", &data.chat_settings.character_limit);
    context.insert("cooldown_secs", &data.chat_settings.cooldown.as_secs());

    match data.tera.render("index.html", &context) {
        Ok(html) => HttpResponse::Ok().content_type("text/html").body(html),
        Err(e) => {
            error!("Template error: {}", e);
            HttpResponse::InternalServerError().body("Template error")
        }
    }
}

// Health check endpoint
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

// Chat API endpoint
pub async fn chat(data: web::Data<AppState>, req: web::Json<ChatRequest>) -> impl Responder {
    let session_id = req.session_id.unwrap_or_else(Uuid::new_v4);
    let lang = req.lang.unwrap_or_default();

    info!("Chat request from session {} ({} characters)", session_id, req.message.chars().count());

    // Guards run under the lock; the exchange itself does not
    let exchange = {
        let mut sessions = match lock_sessions(&data) {
            Ok(guard) => guard,
            Err(response) => return response,
        };
        if !sessions.contains_key(&session_id) {
            evict_idle(&mut sessions, Instant::now());
        }
        let session = sessions
            .entry(session_id)
            .or_insert_with(|| ChatSession::new(data.chat_settings));

        match session.begin_submit(&req.message) {
            Ok(exchange) => exchange,
            Err(err) => {
                let body = ValidationResponse {
                    error: validation_message(&data, lang, &err),
                    key: err.key().to_string(),
                    session_id,
                    cooldown_remaining_secs: session.cooldown_remaining_secs(),
                };
                return match err {
                    ValidationError::Empty | ValidationError::OverLimit { .. } => {
                        HttpResponse::BadRequest().json(body)
                    }
                    ValidationError::Cooldown { .. } | ValidationError::Pending => {
                        HttpResponse::TooManyRequests().json(body)
                    }
                };
            }
        }
    };

    // Spawned so the exchange resolves and the session leaves pending even if
    // the client goes away and this handler is dropped
    let state = data.clone();
    let exchange_task = actix_web::rt::spawn(async move {
        let result = state.gateway.get_response(exchange.text()).await;

        let mut sessions = match state.sessions.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("Failed to lock sessions mutex: {}", e);
                return None;
            }
        };
        let Some(session) = sessions.get_mut(&session_id) else {
            error!("Session {} disappeared during an exchange", session_id);
            return None;
        };

        let response = session.complete(exchange, result).text.clone();
        let body = ChatResponse {
            response,
            session_id,
            error: session.last_error().map(str::to_string),
            cooldown_remaining_secs: session.cooldown_remaining_secs(),
        };
        Some(body)
    });

    match exchange_task.await {
        Ok(Some(body)) => HttpResponse::Ok().json(body),
        Ok(None) => internal_error(),
        Err(e) => {
            error!("Chat exchange task for session {} failed: {}", session_id, e);
            internal_error()
        }
    }
}

pub async fn quick_questions() -> impl Responder {
    HttpResponse::Ok().json(QUICK_QUESTIONS)
}

pub async fn session_state(data: web::Data<AppState>, id: web::Path<Uuid>) -> impl Responder {
    let id = id.into_inner();
    let sessions = match lock_sessions(&data) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    match sessions.get(&id) {
        Some(session) => HttpResponse::Ok().json(session.snapshot()),
        None => session_not_found(id),
    }
}

pub async fn update_draft(
    data: web::Data<AppState>,
    id: web::Path<Uuid>,
    req: web::Json<DraftRequest>,
) -> impl Responder {
    let id = id.into_inner();
    let mut sessions = match lock_sessions(&data) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    let Some(session) = sessions.get_mut(&id) else {
        return session_not_found(id);
    };

    match session.update_draft(&req.text) {
        Ok(()) => HttpResponse::Ok().json(session.snapshot()),
        Err(err) => HttpResponse::BadRequest().json(ValidationResponse {
            error: err.to_string(),
            key: err.key().to_string(),
            session_id: id,
            cooldown_remaining_secs: session.cooldown_remaining_secs(),
        }),
    }
}

pub async fn clear_history(data: web::Data<AppState>, id: web::Path<Uuid>) -> impl Responder {
    let id = id.into_inner();
    let mut sessions = match lock_sessions(&data) {
        Ok(guard) => guard,
        Err(response) => return response,
    };
    match sessions.get_mut(&id) {
        Some(session) => {
            session.clear_history();
            info!("Cleared chat history for session {}", id);
            HttpResponse::Ok().json(session.snapshot())
        }
        None => session_not_found(id),
    }
}

pub async fn search_water(
    data: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> impl Responder {
    let matches: Vec<CitySummary> = data
        .water
        .search(query.q.as_deref().unwrap_or(""))
        .into_iter()
        .map(CitySummary::from)
        .collect();
    HttpResponse::Ok().json(matches)
}

pub async fn city_water(data: web::Data<AppState>, city: web::Path<String>) -> impl Responder {
    match data.water.find(&city) {
        Some(found) => HttpResponse::Ok().json(CityReport {
            data: found,
            status: WaterStatus::from_level(found.water_level),
        }),
        None => HttpResponse::NotFound().json(json!({
            "error": format!("No groundwater data for {}", city)
        })),
    }
}

pub async fn translation_table(
    data: web::Data<AppState>,
    lang: web::Path<String>,
) -> impl Responder {
    let Ok(lang) = lang.parse::<Language>() else {
        return HttpResponse::NotFound().json(json!({ "error": "Unsupported language" }));
    };
    match data.translations.table(lang) {
        Some(table) => HttpResponse::Ok().json(table),
        None => HttpResponse::NotFound().json(json!({ "error": "No translations loaded" })),
    }
}

pub async fn translate(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (lang, key) = path.into_inner();
    let value = data.translations.t(language(Some(&lang)), &key);
    HttpResponse::Ok().json(json!({ "key": key, "value": value }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::tests::{FakeGateway, Script};
    use crate::chat::{Sender, SessionSnapshot};
    use crate::config::ChatSettings;
    use crate::data::i18n::Translations;
    use crate::data::water::{
        CityWater, IdealWaterLevel, RecommendedPlants, WaterAdvisory, WaterDataset,
    };
    use crate::model::Gateway;
    use crate::web::routes;
    use actix_web::http::StatusCode;
    use actix_web::{test, App};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tera::Tera;

    fn city(name: &str, level: f64) -> CityWater {
        CityWater {
            city: name.to_string(),
            state: "Maharashtra".to_string(),
            water_level: level,
            ideal_water_level: IdealWaterLevel::Mediocre,
            water_quality: "Good".to_string(),
            last_updated: "2024-01-15".to_string(),
            water_advisory: WaterAdvisory {
                status: "Normal".to_string(),
                message: "Stable".to_string(),
                conservation: "Mulch".to_string(),
            },
            recommended_plants: RecommendedPlants {
                low_water_requirement: vec!["Millet".to_string()],
                high_water_requirement: vec!["Rice".to_string()],
            },
        }
    }

    fn state(gateway: Arc<dyn Gateway>) -> web::Data<AppState> {
        state_with(gateway, ChatSettings::default())
    }

    fn state_with(gateway: Arc<dyn Gateway>, chat_settings: ChatSettings) -> web::Data<AppState> {
        let mut tera = Tera::default();
        tera.add_raw_template("index.html", "<h1>{{ title }}</h1><p>{{ placeholder }}</p>")
            .unwrap();
        let mut tables = HashMap::new();
        tables.insert(
            Language::En,
            json!({"navbar": {"chatbot": "Chatbot"}, "chatbot": {"placeholder": "Ask about farming"}}),
        );
        tables.insert(
            Language::Hi,
            json!({"chatbot": {"errorCooldown": "{seconds} सेकंड प्रतीक्षा करें"}}),
        );

        web::Data::new(AppState {
            tera,
            gateway,
            chat_settings,
            sessions: Mutex::new(HashMap::new()),
            water: WaterDataset::from_cities(vec![city("Pune", 72.0), city("Nashik", 35.0)]),
            translations: Translations::from_tables(tables),
        })
    }

    macro_rules! app {
        ($data:expr) => {
            test::init_service(App::new().app_data($data.clone()).configure(routes::configure))
                .await
        };
    }

    #[actix_web::test]
    async fn health_reports_ok() {
        let data = state(Arc::new(FakeGateway::new(Script::Reply("hi"))));
        let app = app!(data);
        let body: Value =
            test::call_and_read_body_json(&app, test::TestRequest::get().uri("/health").to_request())
                .await;
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[actix_web::test]
    async fn index_renders_translated_strings() {
        let data = state(Arc::new(FakeGateway::new(Script::Reply("hi"))));
        let app = app!(data);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/?lang=en").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(&body[..], b"<h1>Chatbot</h1><p>Ask about farming</p>");
    }

    #[actix_web::test]
    async fn chat_round_trip_records_history() {
        let gateway = Arc::new(FakeGateway::new(Script::Reply("Try uploading an image.")));
        let data = state(gateway.clone());
        let app = app!(data);

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({"message": "Detect crop disease"}))
            .to_request();
        let resp: ChatResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(resp.response, "Try uploading an image.");
        assert!(resp.error.is_none());
        assert_eq!(resp.cooldown_remaining_secs, 30);
        assert_eq!(gateway.calls(), 1);

        let req = test::TestRequest::get()
            .uri(&format!("/api/chat/{}", resp.session_id))
            .to_request();
        let snapshot: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(snapshot["history"].as_array().unwrap().len(), 2);
        assert_eq!(snapshot["history"][0]["sender"], "user");
        assert_eq!(snapshot["history"][1]["sender"], "assistant");
        assert_eq!(snapshot["is_pending"], false);
        assert_eq!(snapshot["character_limit"], 50);
    }

    #[actix_web::test]
    async fn rejected_submits_map_to_client_errors() {
        let gateway = Arc::new(FakeGateway::new(Script::Reply("ok")));
        let data = state(gateway.clone());
        let app = app!(data);
        let id = Uuid::new_v4();

        let send = |message: String, lang: &str| {
            test::TestRequest::post()
                .uri("/api/chat")
                .set_json(json!({"message": message, "session_id": id, "lang": lang}))
                .to_request()
        };

        let resp = test::call_service(&app, send("   ".into(), "en")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ValidationResponse = test::read_body_json(resp).await;
        assert_eq!(body.key, "chatbot.errorEmpty");
        assert_eq!(body.error, "Please enter a message.");

        let resp = test::call_service(&app, send("x".repeat(51), "en")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = test::call_service(&app, send("first".into(), "en")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(&app, send("second".into(), "hi")).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        let body: ValidationResponse = test::read_body_json(resp).await;
        assert_eq!(body.key, "chatbot.errorCooldown");
        assert!(body.error.ends_with("सेकंड प्रतीक्षा करें"));
        assert!(body.cooldown_remaining_secs > 0);

        assert_eq!(gateway.calls(), 1);
        let sessions = data.sessions.lock().unwrap();
        assert_eq!(sessions[&id].history().len(), 2);
    }

    #[actix_web::test]
    async fn gateway_failure_returns_fallback_reply() {
        let data = state(Arc::new(FakeGateway::new(Script::Misconfigured)));
        let app = app!(data);

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({"message": "hello"}))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: ChatResponse = test::read_body_json(resp).await;
        assert_eq!(body.response, crate::chat::FALLBACK_REPLY);
        assert!(body.error.unwrap().contains("GEMINI_API_KEY"));
    }

    #[actix_web::test]
    async fn clearing_history_keeps_cooldown() {
        let data = state(Arc::new(FakeGateway::new(Script::Reply("ok"))));
        let app = app!(data);
        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({"message": "hello"}))
            .to_request();
        let resp: ChatResponse = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::delete()
            .uri(&format!("/api/chat/{}", resp.session_id))
            .to_request();
        let snapshot: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(snapshot["history"], json!([]));
        assert!(snapshot["cooldown_remaining_secs"].as_u64().unwrap() > 0);

        let req = test::TestRequest::delete()
            .uri(&format!("/api/chat/{}", Uuid::new_v4()))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn draft_updates_respect_limit() {
        let data = state(Arc::new(FakeGateway::new(Script::Reply("ok"))));
        let app = app!(data);
        let id = Uuid::new_v4();
        let uri = format!("/api/chat/{}/draft", id);

        let req = test::TestRequest::put()
            .uri(&uri)
            .set_json(json!({"text": "Market prices"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
        assert!(data.sessions.lock().unwrap().is_empty());

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({"message": "hello", "session_id": id}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::put()
            .uri(&uri)
            .set_json(json!({"text": "Market prices"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::put()
            .uri(&uri)
            .set_json(json!({"text": "y".repeat(80)}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let sessions = data.sessions.lock().unwrap();
        let snapshot: SessionSnapshot = sessions[&id].snapshot();
        assert_eq!(snapshot.draft, "Market prices");
        assert_eq!(snapshot.history.len(), 2);
        assert_eq!(snapshot.history[0].sender, Sender::User);
    }

    #[actix_web::test]
    async fn abandoned_request_still_completes_exchange() {
        let gateway = Arc::new(FakeGateway::new(Script::Delayed("late answer", 100)));
        let data = state_with(
            gateway.clone(),
            ChatSettings {
                cooldown: Duration::ZERO,
                ..ChatSettings::default()
            },
        );
        let id = Uuid::new_v4();
        let request = web::Json(ChatRequest {
            message: "first".into(),
            session_id: Some(id),
            lang: None,
        });

        // Client disconnects: the handler future is dropped mid-exchange
        let dropped = tokio::time::timeout(Duration::from_millis(20), chat(data.clone(), request)).await;
        assert!(dropped.is_err());
        assert!(data.sessions.lock().unwrap()[&id].is_pending());

        tokio::time::sleep(Duration::from_millis(300)).await;
        {
            let sessions = data.sessions.lock().unwrap();
            let session = &sessions[&id];
            assert!(!session.is_pending());
            assert_eq!(session.history().len(), 2);
            assert_eq!(session.history()[1].text, "late answer");
        }

        let app = app!(data);
        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({"message": "again", "session_id": id}))
            .to_request();
        let resp: ChatResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(resp.response, "late answer");
        assert_eq!(gateway.calls(), 2);
    }

    #[actix_web::test]
    async fn idle_sessions_are_evicted_when_new_ones_arrive() {
        let data = state_with(
            Arc::new(FakeGateway::new(Script::Reply("ok"))),
            ChatSettings {
                session_ttl: Duration::ZERO,
                ..ChatSettings::default()
            },
        );
        let app = app!(data);
        let send = || {
            test::TestRequest::post()
                .uri("/api/chat")
                .set_json(json!({"message": "hello"}))
                .to_request()
        };

        let first: ChatResponse = test::call_and_read_body_json(&app, send()).await;
        let second: ChatResponse = test::call_and_read_body_json(&app, send()).await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/chat/{}", first.session_id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get()
            .uri(&format!("/api/chat/{}", second.session_id))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
        assert_eq!(data.sessions.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn pending_sessions_survive_eviction() {
        let data = state_with(
            Arc::new(FakeGateway::new(Script::Reply("ok"))),
            ChatSettings {
                session_ttl: Duration::ZERO,
                ..ChatSettings::default()
            },
        );
        let busy = Uuid::new_v4();
        let _in_flight = {
            let mut sessions = data.sessions.lock().unwrap();
            let session = sessions
                .entry(busy)
                .or_insert_with(|| ChatSession::new(data.chat_settings));
            session.begin_submit("still waiting").unwrap()
        };
        let app = app!(data);

        let req = test::TestRequest::post()
            .uri("/api/chat")
            .set_json(json!({"message": "hello"}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        assert!(data.sessions.lock().unwrap().contains_key(&busy));
    }

    #[actix_web::test]
    async fn quick_questions_are_listed() {
        let data = state(Arc::new(FakeGateway::new(Script::Reply("ok"))));
        let app = app!(data);
        let req = test::TestRequest::get().uri("/api/chat/quick-questions").to_request();
        let body: Vec<String> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.len(), QUICK_QUESTIONS.len());
        assert_eq!(body[0], "Detect crop disease");
    }

    #[actix_web::test]
    async fn water_search_and_lookup() {
        let data = state(Arc::new(FakeGateway::new(Script::Reply("ok"))));
        let app = app!(data);

        let req = test::TestRequest::get().uri("/api/water?q=nas").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!([{"city": "Nashik", "state": "Maharashtra", "water_level": 35.0, "status": "critical"}]));

        let req = test::TestRequest::get().uri("/api/water/pune").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["city"], "Pune");
        assert_eq!(body["status"], "good");
        assert_eq!(body["recommendedPlants"]["highWaterRequirement"], json!(["Rice"]));

        let req = test::TestRequest::get().uri("/api/water/Delhi").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn translation_lookups() {
        let data = state(Arc::new(FakeGateway::new(Script::Reply("ok"))));
        let app = app!(data);

        let req = test::TestRequest::get().uri("/api/i18n/en/chatbot.placeholder").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!({"key": "chatbot.placeholder", "value": "Ask about farming"}));

        let req = test::TestRequest::get().uri("/api/i18n/en/nope.missing").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["value"], "nope.missing");

        let req = test::TestRequest::get().uri("/api/i18n/fr").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }
}
