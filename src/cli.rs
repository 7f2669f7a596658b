//! CLI interface for smart-quiz

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{self, Config};
use crate::generation::LlmClient;
use crate::quiz::{classify, QuizService};
use crate::server::{self, auth::STAFF_PERMISSION, TlsPaths};
use crate::store::SqliteStore;
use crate::types::WeakTopicQuiz;

#[derive(Parser)]
#[command(name = "smart-quiz")]
#[command(about = "Adaptive quiz generation from learner performance", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "SMART_QUIZ_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Path to TLS certificate (enables HTTPS together with --key)
        #[arg(long, requires = "key")]
        cert: Option<String>,
        /// Path to TLS private key
        #[arg(long, requires = "cert")]
        key: Option<String>,
    },
    /// Print the tier for a number of correct recent answers
    Classify {
        /// Correct answers among the five most recent attempts
        correct: usize,
    },
    /// Record a graded attempt
    RecordAttempt {
        #[arg(short, long)]
        learner: String,
        #[arg(short, long)]
        topic: String,
        /// Mark the attempt as correct (default: incorrect)
        #[arg(long)]
        correct: bool,
    },
    /// Record a topic score (0-100)
    RecordScore {
        #[arg(short, long)]
        learner: String,
        #[arg(short, long)]
        topic: String,
        #[arg(short, long)]
        score: f64,
    },
    /// Generate one question at the learner's current tier
    Question {
        #[arg(short, long)]
        learner: String,
        #[arg(short, long)]
        topic: String,
    },
    /// Generate a quiz over the learner's weak topics
    Quiz {
        #[arg(short, long)]
        learner: String,
    },
    /// Check an answer to a stored quiz question
    Check {
        /// Question ID
        question: String,
        /// The learner's answer (text or option letter)
        answer: String,
    },
    /// Suggest the next topics for a learner
    Path {
        #[arg(short, long)]
        learner: String,
    },
    /// Issue an access/refresh token pair
    Token {
        /// Learner ID the token is issued for
        learner: String,
        /// Allow the token to act for any learner
        #[arg(long)]
        staff: bool,
    },
    /// Show database row counts
    Stats,
    /// Show or initialise the configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
        /// Write a default config file (with a fresh JWT secret)
        #[arg(long)]
        init: bool,
    },
}

/// Run the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_file = cli.config.clone();
    let load = || -> Result<Config> {
        match &config_file {
            Some(path) => Config::load_from(path),
            None => Config::load(),
        }
    };

    match cli.command {
        Commands::Serve { port, host, cert, key } => {
            let mut config = load()?;
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            let tls = cert.zip(key).map(|(cert, key)| TlsPaths { cert, key });
            server::start(config, tls).await
        }
        Commands::Classify { correct } => {
            println!("{}", classify(correct));
            Ok(())
        }
        Commands::RecordAttempt { learner, topic, correct } => {
            let config = load()?;
            let service = offline_service(&config).await?;
            let record = service.record_attempt(&learner, &topic, correct).await?;
            let outcome = if correct { "correct" } else { "incorrect" };
            println!("Recorded attempt #{} ({} on {}: {})", record.id, learner, topic, outcome);
            Ok(())
        }
        Commands::RecordScore { learner, topic, score } => {
            let config = load()?;
            let service = offline_service(&config).await?;
            let record = service.record_score(&learner, &topic, score).await?;
            println!("Recorded score #{} ({} on {}: {})", record.id, learner, topic, score);
            Ok(())
        }
        Commands::Question { learner, topic } => {
            let config = load()?;
            let question = build_service(&config).await?.generate_question(&learner, &topic).await?;
            println!("[{}] {}", question.difficulty, question.question);
            Ok(())
        }
        Commands::Quiz { learner } => {
            let config = load()?;
            match build_service(&config).await?.generate_weak_topic_quiz(&learner).await? {
                WeakTopicQuiz::NoWeakAreas => println!("No weak areas for {}", learner),
                WeakTopicQuiz::Quiz(questions) => {
                    for (n, q) in questions.iter().enumerate() {
                        println!("{}. {}  ({})", n + 1, q.question, q.id);
                        for (letter, option) in ['A', 'B', 'C', 'D'].iter().zip(&q.options) {
                            println!("   {}) {}", letter, option);
                        }
                        println!();
                    }
                }
            }
            Ok(())
        }
        Commands::Check { question, answer } => {
            let config = load()?;
            let service = build_service(&config).await?;
            let q = service.question(&question).await?;
            let check = service.check_answer(&q, &answer).await?;
            println!("{}", check.message);
            Ok(())
        }
        Commands::Path { learner } => {
            let config = load()?;
            let path = build_service(&config).await?.learning_path(&learner).await?;
            if path.weak_topics.is_empty() {
                println!("Weak topics: none");
            } else {
                println!("Weak topics: {}", path.weak_topics.join(", "));
            }
            for line in path.recommendations {
                println!("  {}", line);
            }
            Ok(())
        }
        Commands::Token { learner, staff } => {
            let mut config = load()?;
            if config.auth.jwt_secret.is_none() {
                anyhow::bail!("auth.jwt_secret is not set; run `smart-quiz config --init` first");
            }
            let auth_state = server::auth_state_from(&mut config);
            let permissions = if staff { vec![STAFF_PERMISSION.to_string()] } else { Vec::new() };
            let pair = server::auth::issue_token_pair(&auth_state, &learner, &permissions)?;
            println!("{}", serde_json::to_string_pretty(&pair)?);
            Ok(())
        }
        Commands::Stats => {
            let config = load()?;
            let stats = open_store(&config).await?.stats().await?;
            println!("Attempts:       {}", stats.attempts);
            println!("Scores:         {}", stats.scores);
            println!("Quiz questions: {}", stats.quiz_questions);
            Ok(())
        }
        Commands::Config { show, init } => {
            if init {
                let path = match &config_file {
                    Some(path) => path.clone(),
                    None => config::config_path()?,
                };
                if path.exists() {
                    anyhow::bail!("Config file already exists: {}", path.display());
                }
                let mut config = Config::default();
                config.ensure_jwt_secret();
                config.save_to(&path)?;
                println!("Wrote {}", path.display());
            }
            if show || !init {
                config::show_config(&load()?);
            }
            Ok(())
        }
    }
}

async fn open_store(config: &Config) -> Result<SqliteStore> {
    let path = config.database_path()?;
    SqliteStore::open(&path)
        .await
        .with_context(|| format!("Failed to open database {}", path.display()))
}

async fn build_service(config: &Config) -> Result<QuizService> {
    let store = open_store(config).await?;
    let provider = LlmClient::new(config.provider_config()?)?;
    Ok(QuizService::new(Arc::new(store), Arc::new(provider), config.quiz_settings()))
}

/// Service for commands that never reach the provider
async fn offline_service(config: &Config) -> Result<QuizService> {
    let store = open_store(config).await?;
    let provider = LlmClient::new(crate::generation::ProviderConfig::with_url(
        config.provider.base_url.clone(),
        String::new(),
        config.provider.model.clone(),
    ))?;
    Ok(QuizService::new(Arc::new(store), Arc::new(provider), config.quiz_settings()))
}
