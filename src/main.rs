use adkstream_rs::config::{load_config, AppConfig};
use adkstream_rs::model::{AdkLanguageModel, AdkProvider, StreamRequest};
use adkstream_rs::observability::init_tracing;
use adkstream_rs::protocol::normalized::{ClientStreamEvent, NormalizedMessage};
use adkstream_rs::AdapterError;
use futures_util::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const CONFIG_PATH_ENV: &str = "ADKSTREAM_CONFIG";

fn main() {
    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration from '{config_path}': {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level, config.features.log_json);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialize Tokio runtime: {e}");
            std::process::exit(1);
        });

    let prompt: Vec<String> = std::env::args().skip(1).collect();
    let code = runtime.block_on(async move {
        match run(config, prompt).await {
            Ok(()) => 0,
            Err(err) => {
                eprintln!("adkstream: {err}");
                1
            }
        }
    });
    std::process::exit(code);
}

async fn run(config: AppConfig, prompt: Vec<String>) -> Result<(), AdapterError> {
    let provider = AdkProvider::from_config(&config)?;
    let model = provider.default_model()?;
    tracing::info!(
        base_url = %provider.agent().session_base_url(),
        app_name = %provider.agent().app_name,
        "adkstream ready"
    );

    if !prompt.is_empty() {
        return run_turn(&model, prompt.join(" ")).await;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => return Err(AdapterError::Internal(format!("stdin read failed: {err}"))),
        };
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                model.sessions().clear_current_session();
                eprintln!("[new session on next prompt]");
            }
            "/delete" => {
                if let Some(session) = model.sessions().current_session() {
                    model
                        .sessions()
                        .delete_session(&session.user_id, &session.session_id)
                        .await?;
                    model.sessions().clear_current_session();
                    eprintln!("[deleted session {}]", session.session_id);
                }
            }
            text => {
                if let Err(err) = run_turn(&model, text.to_string()).await {
                    eprintln!("[error] {err}");
                }
            }
        }
    }
    Ok(())
}

async fn run_turn(model: &AdkLanguageModel, text: String) -> Result<(), AdapterError> {
    let mut stream = model.stream(StreamRequest::new(vec![NormalizedMessage::user(text)]));
    let mut stdout = tokio::io::stdout();
    while let Some(item) = stream.next().await {
        match item? {
            ClientStreamEvent::TextDelta { delta, .. } => {
                stdout
                    .write_all(delta.as_bytes())
                    .await
                    .map_err(|err| AdapterError::Internal(format!("stdout write failed: {err}")))?;
                stdout
                    .flush()
                    .await
                    .map_err(|err| AdapterError::Internal(format!("stdout write failed: {err}")))?;
            }
            ClientStreamEvent::ToolCallDelta {
                tool_call_id,
                tool_name,
                args_text_delta,
            } => {
                eprintln!("[tool call {tool_call_id}] {tool_name}({args_text_delta})");
            }
            ClientStreamEvent::Finish { reason, usage } => {
                stdout
                    .write_all(b"\n")
                    .await
                    .map_err(|err| AdapterError::Internal(format!("stdout write failed: {err}")))?;
                tracing::debug!(
                    reason = reason.as_str(),
                    total_tokens = usage.total_tokens,
                    "turn finished"
                );
            }
        }
    }
    Ok(())
}
