use super::*;

fn client_with_base(base_url: &str) -> ChatClient {
    let agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(1)))
        .build()
        .into();
    ChatClient {
        base_url: base_url.to_string(),
        model: "deepseek-coder".to_string(),
        api_key: "test-key".to_string(),
        temperature: 0.0,
        agent,
        retry_attempts: 1,
    }
}

#[test]
fn test_completions_url_preserves_path_prefix() {
    let client = client_with_base("https://api.deepseek.com/v1");
    assert_eq!(
        client.completions_url(),
        "https://api.deepseek.com/v1/chat/completions"
    );
}

#[test]
fn test_completions_url_trailing_slash() {
    let client = client_with_base("http://localhost:8000/");
    assert_eq!(
        client.completions_url(),
        "http://localhost:8000/chat/completions"
    );
}

#[test]
fn test_chat_response_parsing() {
    let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
    let response: ChatResponse = serde_json::from_str(body).unwrap();
    assert_eq!(response.choices[0].message.content, "hello");
}

#[test]
fn test_new_fails_without_api_key_env() {
    let mut config = Config::default();
    config.llm.api_key_env = "PATCHFORGE_TEST_KEY_THAT_IS_NOT_SET".to_string();
    assert!(ChatClient::new(&config).is_err());
}

#[test]
fn test_prompts_embed_their_inputs() {
    let user = prompts::planner_user("add logging", "[app.py :: main :: lines 1-3]\n...");
    assert!(user.contains("add logging"));
    assert!(user.contains("app.py :: main"));

    let user = prompts::patch_user("add logging", "- use stdlib logging", "src/app.py", "x = 1\n");
    assert!(user.contains("src/app.py"));
    assert!(user.contains("<<<FILE"));
    assert!(user.contains("x = 1"));
}
