use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wayfinder_agents::{IntentClassifier, TravelAgent};
use wayfinder_core::{ChatMessage, ExtractedIntent, GeoPoint, TurnRequest};
use wayfinder_observability::{init_tracing, AppMetrics};
use wayfinder_services::{classifier_model, ChatCompletionsClient, ServiceHub, Settings};

type Agent = TravelAgent<ServiceHub, ChatCompletionsClient>;

#[derive(Debug, Parser)]
#[command(name = "wayfinder")]
#[command(about = "Wayfinder travel assistant CLI")]
struct Cli {
    /// Latitude of the traveller; defaults to WAYFINDER_DEFAULT_LAT.
    #[arg(long, global = true, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,

    #[arg(long, global = true, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive session that keeps history between turns.
    Chat {
        #[arg(long)]
        debug: bool,
    },
    /// Print the intent the classifier reads from TEXT.
    Classify {
        text: String,
        /// Descriptor of the previous turn, for follow-up questions.
        #[arg(long)]
        previous: Option<String>,
    },
    /// Run one turn and print the full reply with debug payload.
    Ask { text: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("wayfinder_cli");
    let cli = Cli::parse();

    let settings = Settings::load().context("failed to load settings")?;
    let location = match (cli.lat, cli.lng) {
        (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng).context("invalid --lat/--lng")?),
        _ => None,
    };

    match cli.command {
        Command::Chat { debug } => {
            let agent = build_agent(&settings)?;
            run_chat(agent, location, debug).await?;
        }
        Command::Classify { text, previous } => {
            let metrics = AppMetrics::shared();
            let classifier = IntentClassifier::new(
                classifier_model(&settings)?,
                settings.classifier_mode,
                metrics,
            );
            let previous = previous.map(ExtractedIntent::places);
            let intent = classifier.classify(&text, previous.as_ref()).await?;
            println!("{}", serde_json::to_string_pretty(&intent)?);
        }
        Command::Ask { text } => {
            let agent = build_agent(&settings)?;
            let reply = agent
                .handle_turn(TurnRequest {
                    input: text,
                    location,
                    debug: true,
                    ..TurnRequest::default()
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
    }

    Ok(())
}

fn build_agent(settings: &Settings) -> Result<Agent> {
    let metrics = AppMetrics::shared();
    let hub = ServiceHub::from_settings(settings).context("failed to build service clients")?;
    let classifier = IntentClassifier::new(
        classifier_model(settings)?,
        settings.classifier_mode,
        metrics.clone(),
    );
    Ok(TravelAgent::new(
        Arc::new(hub),
        classifier,
        metrics,
        settings.default_location,
    ))
}

async fn run_chat(agent: Agent, location: Option<GeoPoint>, show_debug: bool) -> Result<()> {
    let mut history: Vec<ChatMessage> = Vec::new();
    let mut previous_intent: Option<ExtractedIntent> = None;

    println!("Wayfinder chat mode. type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.is_empty() {
            continue;
        }

        let reply = agent
            .handle_turn(TurnRequest {
                input: message.to_string(),
                messages: history.clone(),
                location,
                debug: true,
                previous_intent: previous_intent.clone(),
            })
            .await;

        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                eprintln!("error: {err}");
                continue;
            }
        };

        // Greetings carry no intent and keep the last one in effect.
        if let Some(intent) = reply
            .debug
            .as_ref()
            .and_then(|debug| debug.get("intent"))
            .and_then(|intent| serde_json::from_value::<ExtractedIntent>(intent.clone()).ok())
        {
            previous_intent = Some(intent);
        }

        println!("\n{}\n", reply.content);
        if show_debug {
            if let Some(debug) = reply.debug.as_ref() {
                println!("{}\n", serde_json::to_string_pretty(debug)?);
            }
        }

        history.push(ChatMessage::user(message));
        history.push(ChatMessage::assistant(reply.content));
    }

    Ok(())
}
