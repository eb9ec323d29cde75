use rimagen::logger::render_progress_bar;
use rimagen::{
    ChatClient, Config, GenerationObserver, GenerationSession, GenerationState, OpenAiClient,
    OpenAiConfig, ReferenceImage,
};
use std::env;

struct ConsoleObserver;

impl GenerationObserver for ConsoleObserver {
    fn on_progress(&mut self, percent: u32) {
        log::info!("🎨 {}", render_progress_bar(percent, 20));
    }

    fn on_image(&mut self, url: &str) {
        log::info!("🖼️  Image ready: {}", url);
    }

    fn on_complete(&mut self, state: &GenerationState) {
        if state.image_url.is_empty() {
            log::warn!("⚠️  Stream closed without producing an image");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file first
    match dotenv::dotenv() {
        Ok(_) => log::info!("✅ .env file loaded successfully"),
        Err(_) => log::warn!("⚠️  No .env file found, using system environment variables"),
    }

    rimagen::logger::init_with_config(
        rimagen::logger::LoggerConfig::development()
            .with_level(rimagen::logger::LogLevel::Debug),
    )?;

    rimagen::logger::log_startup_info("rimagen", env!("CARGO_PKG_VERSION"));

    log::info!("🔍 Checking OpenAI environment...");

    if let Ok(base_url) = env::var("OPENAI_BASE_URL") {
        log::info!("OPENAI_BASE_URL: {}", base_url);
    } else {
        log::warn!("No OPENAI_BASE_URL set, using the default endpoint");
    }

    match env::var("OPENAI_API_KEY") {
        Ok(api_key) => {
            log::info!("✅ OpenAI API key found in environment");
            log::debug!("API key starts with: {}...", &api_key[..5.min(api_key.len())]);
        }
        Err(_) => {
            log::warn!("⚠️  No OPENAI_API_KEY in environment variables");
            log::error!("❌ This will likely cause authentication failures");
        }
    }

    log::info!("📚 Available image generation models:");
    for model in ChatClient::supported_models() {
        log::info!("  {} - {} ({})", model.id, model.name, model.provider);
    }

    let config = Config::from_env();
    rimagen::logger::log_config_info(&config);

    let openai_config = config
        .openai
        .clone()
        .unwrap_or_else(OpenAiConfig::from_env);

    log::info!("🔄 Creating OpenAI client...");
    let client = match OpenAiClient::new(openai_config) {
        Ok(client) => {
            log::info!("✅ OpenAI client initialized successfully");
            client
        }
        Err(e) => {
            log::error!("❌ Failed to initialize OpenAI client: {}", e);
            return Err(e.into());
        }
    };

    let mut args = env::args().skip(1);
    let prompt = args
        .next()
        .or_else(|| config.default_prompt.clone())
        .unwrap_or_else(|| "Redraw this photo in a cyberpunk style".to_string());
    let image_path = args.next();

    let mut session = GenerationSession::with_observer(client, Box::new(ConsoleObserver));
    session.set_prompt(prompt.as_str());

    if let Some(path) = image_path {
        log::info!("🔄 Encoding reference image: {}", path);
        match ReferenceImage::from_file(&path) {
            Ok(image) => {
                session.set_reference_image(image);
                log::info!("✅ Reference image attached");
            }
            Err(e) => {
                log::error!("❌ Failed to load reference image: {}", e);
                return Err(e.into());
            }
        }
    }

    log::info!("🔄 Generating image for prompt: {}", prompt);
    let generation_timer = rimagen::logger::timer("image_generation");

    match session.generate().await {
        Ok(outcome) => {
            drop(generation_timer);
            log::info!("✅ Generation finished with model {}", outcome.model);
            if outcome.image_url.is_empty() {
                log::warn!("⚠️  No image link found in the stream");
            } else {
                log::info!("🖼️  Generated image: {}", outcome.image_url);
            }
        }
        Err(e) => {
            log::error!("❌ Generation failed: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
