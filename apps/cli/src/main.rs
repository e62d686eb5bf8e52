use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand};
use curalink_auth::NewUser;
use curalink_config::load as load_config;
use curalink_runtime::{telemetry, AppController, AppServices};
use curalink_storage::{
    ClinicalTrial, Expert, FavoriteItem, FavoriteKind, ForumPost, PatientProfile, Profile,
    Publication, ResearcherProfile, UserType,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser)]
#[command(name = "curalink")]
#[command(about = "CuraLink clinical research companion (console by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Signup(SignupArgs),
    /// Sign in with an existing account
    Login {
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and forget the saved session
    Logout,
    /// Show the signed-in user and their profile
    Whoami,
    /// Search ClinicalTrials.gov
    Trials {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Search PubMed publications
    Publications {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Find researchers by publication activity
    Experts {
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Explain medical text in plain language
    Summarize {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Extract condition names from free text
    Conditions {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// List or change saved favorites
    Favorites {
        #[command(subcommand)]
        action: Option<FavoritesAction>,
    },
    /// Trials matching the signed-in patient's conditions
    Match {
        /// Generate a match report for the trial at this position
        #[arg(long, value_name = "N")]
        report: Option<usize>,
    },
    /// Community forum
    Forum {
        #[command(subcommand)]
        action: ForumAction,
    },
    /// Start interactive console (default)
    Console,
}

#[derive(Args)]
struct SignupArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    /// patient or researcher
    #[arg(long = "as", value_name = "ROLE", default_value = "patient")]
    user_type: UserType,
    /// A diagnosed condition; repeat for several
    #[arg(long = "condition")]
    conditions: Vec<String>,
    /// Free-text medical background. Conditions are extracted from it when none are given.
    #[arg(long)]
    info: Option<String>,
    #[arg(long)]
    specialty: Option<String>,
    #[arg(long)]
    institution: Option<String>,
    #[arg(long)]
    orcid: Option<String>,
}

#[derive(Subcommand)]
enum FavoritesAction {
    /// List saved favorites
    List,
    /// Search, then save or unsave the result at a position
    Toggle {
        /// trial, publication or expert
        kind: FavoriteKind,
        /// 1-based position in the search results
        index: usize,
        #[arg(long, required = true, num_args = 1..)]
        query: Vec<String>,
    },
}

#[derive(Subcommand)]
enum ForumAction {
    /// List posts, optionally in one category
    List {
        #[arg(long)]
        category: Option<String>,
    },
    /// Start a discussion
    Post {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "General")]
        category: String,
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },
    /// Reply to a discussion (researchers only)
    Reply {
        post_id: String,
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;
    let config = load_config().context("failed to load configuration")?;
    let services = AppServices::initialise(&config)
        .await
        .context("failed to initialise services")?;

    let mut controller = services.controller();
    controller
        .restore()
        .await
        .context("failed to restore session")?;

    match cli.command.unwrap_or(Commands::Console) {
        Commands::Signup(args) => signup(&mut controller, args).await,
        Commands::Login { email, password } => login(&mut controller, &email, &password).await,
        Commands::Logout => {
            controller.logout().await?;
            println!("Signed out.");
            Ok(())
        }
        Commands::Whoami => {
            whoami(&controller);
            Ok(())
        }
        Commands::Trials { query } => {
            print_trials(&search_trials(&controller, &query.join(" ")).await);
            Ok(())
        }
        Commands::Publications { query } => {
            print_publications(&search_publications(&controller, &query.join(" ")).await);
            Ok(())
        }
        Commands::Experts { query } => {
            print_experts(&search_experts(&controller, &query.join(" ")).await);
            Ok(())
        }
        Commands::Summarize { text } => {
            let summary = controller
                .services()
                .research
                .gemini
                .summarize(&text.join(" "))
                .await;
            println!("{summary}");
            Ok(())
        }
        Commands::Conditions { text } => {
            let conditions = controller
                .services()
                .research
                .gemini
                .parse_conditions(&text.join(" "))
                .await;
            if conditions.is_empty() {
                println!("No conditions identified.");
            }
            for condition in conditions {
                println!("- {condition}");
            }
            Ok(())
        }
        Commands::Favorites { action } => match action.unwrap_or(FavoritesAction::List) {
            FavoritesAction::List => {
                require_sign_in(&controller)?;
                print_favorites(controller.favorites());
                Ok(())
            }
            FavoritesAction::Toggle { kind, index, query } => {
                let results = search(&controller, kind, &query.join(" ")).await;
                let item = pick(&results, index)?.clone();
                toggle(&mut controller, item).await
            }
        },
        Commands::Match { report } => match_trials(&controller, report).await,
        Commands::Forum { action } => forum(&controller, action).await,
        Commands::Console => run_console(controller).await,
    }
}

async fn signup(controller: &mut AppController, args: SignupArgs) -> anyhow::Result<()> {
    let profile = match args.user_type {
        UserType::Patient => {
            let mut conditions = args.conditions;
            let additional_info = args.info.unwrap_or_default();
            if conditions.is_empty() && !additional_info.trim().is_empty() {
                conditions = controller
                    .services()
                    .research
                    .gemini
                    .parse_conditions(&additional_info)
                    .await;
            }
            Profile::Patient(PatientProfile {
                medical_conditions: conditions,
                additional_info,
            })
        }
        UserType::Researcher => Profile::Researcher(ResearcherProfile {
            specialty: args.specialty.unwrap_or_default(),
            institution: args.institution.unwrap_or_default(),
            orcid: args.orcid,
        }),
    };

    let new_user = NewUser {
        name: args.name,
        email: args.email,
        password: args.password,
        user_type: args.user_type,
    };

    if !controller.signup(new_user, profile).await? {
        bail!(rejection(controller));
    }

    info!("signed up");
    whoami(controller);
    Ok(())
}

async fn login(controller: &mut AppController, email: &str, password: &str) -> anyhow::Result<()> {
    if !controller.login(email, password).await? {
        bail!(rejection(controller));
    }

    whoami(controller);
    Ok(())
}

fn rejection(controller: &AppController) -> String {
    controller
        .auth_error()
        .unwrap_or("authentication failed")
        .to_string()
}

fn require_sign_in(controller: &AppController) -> anyhow::Result<()> {
    if controller.is_authenticated() {
        Ok(())
    } else {
        bail!("not signed in; run `curalink login` first")
    }
}

async fn toggle(controller: &mut AppController, item: FavoriteItem) -> anyhow::Result<()> {
    require_sign_in(controller)?;
    let label = item.label().to_owned();
    let kind = item.kind();

    if controller.toggle_favorite(item).await? {
        println!("Saved {kind}: {label}");
    } else {
        println!("Removed {kind}: {label}");
    }
    Ok(())
}

async fn match_trials(controller: &AppController, report: Option<usize>) -> anyhow::Result<()> {
    require_sign_in(controller)?;
    let trials = controller.matching_trials().await?;

    let Some(index) = report else {
        if trials.is_empty() {
            println!("No trials match your profile conditions yet.");
        }
        print_trials(&trials);
        return Ok(());
    };

    let trial = trials
        .get(index.wrapping_sub(1))
        .ok_or_else(|| anyhow!("no matching trial at position {index}"))?;
    println!("{}\n", trial.title);
    println!("{}", controller.trial_match_report(trial).await?);
    Ok(())
}

async fn forum(controller: &AppController, action: ForumAction) -> anyhow::Result<()> {
    match action {
        ForumAction::List { category } => {
            print_posts(&controller.forum_posts(category.as_deref()).await);
        }
        ForumAction::Post {
            title,
            category,
            content,
        } => {
            require_sign_in(controller)?;
            let post = controller
                .create_forum_post(&title, &content.join(" "), &category)
                .await?;
            println!("Posted {} in {}", post.id, post.category);
        }
        ForumAction::Reply { post_id, content } => {
            require_sign_in(controller)?;
            let post = controller.reply_to_post(&post_id, &content.join(" ")).await?;
            println!("Replied to \"{}\" ({} replies)", post.title, post.replies.len());
        }
    }
    Ok(())
}

async fn search_trials(controller: &AppController, query: &str) -> Vec<ClinicalTrial> {
    controller.services().research.trials.search_trials(query).await
}

async fn search_publications(controller: &AppController, query: &str) -> Vec<Publication> {
    controller
        .services()
        .research
        .publications
        .search_publications(query)
        .await
}

async fn search_experts(controller: &AppController, query: &str) -> Vec<Expert> {
    controller.services().research.experts.search_experts(query).await
}

async fn search(controller: &AppController, kind: FavoriteKind, query: &str) -> Vec<FavoriteItem> {
    match kind {
        FavoriteKind::Trial => search_trials(controller, query)
            .await
            .into_iter()
            .map(FavoriteItem::from)
            .collect(),
        FavoriteKind::Publication => search_publications(controller, query)
            .await
            .into_iter()
            .map(FavoriteItem::from)
            .collect(),
        FavoriteKind::Expert => search_experts(controller, query)
            .await
            .into_iter()
            .map(FavoriteItem::from)
            .collect(),
    }
}

fn pick(results: &[FavoriteItem], index: usize) -> anyhow::Result<&FavoriteItem> {
    results
        .get(index.wrapping_sub(1))
        .ok_or_else(|| anyhow!("no result at position {index} ({} found)", results.len()))
}

async fn run_console(mut controller: AppController) -> anyhow::Result<()> {
    info!("starting interactive console");

    println!("CuraLink Interactive Console");
    println!("Type commands like '/help', '/trials <query>', '/save <n>', '/quit'");
    println!("Use Ctrl+C or '/quit' to exit");
    println!("---");
    if let Some(user) = controller.user() {
        println!("Welcome back, {}.", user.name);
    }

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();
    let mut last_results: Vec<FavoriteItem> = Vec::new();

    let shutdown = curalink_runtime::shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        line.clear();
        let bytes_read = tokio::select! {
            read = reader.read_line(&mut line) => read?,
            _ = &mut shutdown => break,
        };
        if bytes_read == 0 {
            break; // EOF
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let (command, argument) = match input.split_once(' ') {
            Some((command, argument)) => (command, argument.trim()),
            None => (input, ""),
        };

        let outcome = match command {
            "/quit" | "/exit" | "/q" => {
                println!("Goodbye!");
                break;
            }
            "/help" | "/h" => {
                print_console_help();
                Ok(())
            }
            "/login" => match argument.split_once(' ') {
                Some((email, password)) => login(&mut controller, email, password.trim()).await,
                None => Err(anyhow!("usage: /login <email> <password>")),
            },
            "/logout" => controller
                .logout()
                .await
                .map(|()| println!("Signed out."))
                .map_err(anyhow::Error::from),
            "/whoami" | "/me" => {
                whoami(&controller);
                Ok(())
            }
            "/trials" | "/t" => {
                let trials = search_trials(&controller, argument).await;
                print_trials(&trials);
                last_results = trials.into_iter().map(FavoriteItem::from).collect();
                Ok(())
            }
            "/pubs" | "/p" => {
                let publications = search_publications(&controller, argument).await;
                print_publications(&publications);
                last_results = publications.into_iter().map(FavoriteItem::from).collect();
                Ok(())
            }
            "/experts" | "/e" => {
                let experts = search_experts(&controller, argument).await;
                print_experts(&experts);
                last_results = experts.into_iter().map(FavoriteItem::from).collect();
                Ok(())
            }
            "/match" | "/m" => match controller.matching_trials().await {
                Ok(trials) => {
                    print_trials(&trials);
                    last_results = trials.into_iter().map(FavoriteItem::from).collect();
                    Ok(())
                }
                Err(error) => Err(error.into()),
            },
            "/report" => console_report(&controller, &last_results, argument).await,
            "/save" | "/s" => match argument.parse::<usize>() {
                Ok(index) => match pick(&last_results, index) {
                    Ok(item) => toggle(&mut controller, item.clone()).await,
                    Err(error) => Err(error),
                },
                Err(_) => Err(anyhow!("usage: /save <n> after a search")),
            },
            "/favorites" | "/f" => {
                print_favorites(controller.favorites());
                last_results = controller.favorites().to_vec();
                Ok(())
            }
            "/summarize" => {
                let summary = controller
                    .services()
                    .research
                    .gemini
                    .summarize(argument)
                    .await;
                println!("{summary}");
                Ok(())
            }
            "/forum" => {
                let category = (!argument.is_empty()).then_some(argument);
                print_posts(&controller.forum_posts(category).await);
                Ok(())
            }
            _ => {
                println!("Unknown command: {}", command);
                println!("Type '/help' for available commands");
                Ok(())
            }
        };

        if let Err(error) = outcome {
            println!("Error: {error:#}");
        }
    }

    Ok(())
}

async fn console_report(
    controller: &AppController,
    last_results: &[FavoriteItem],
    argument: &str,
) -> anyhow::Result<()> {
    let index: usize = argument
        .parse()
        .map_err(|_| anyhow!("usage: /report <n> after /match or /trials"))?;

    let FavoriteItem::Trial(trial) = pick(last_results, index)? else {
        bail!("result {index} is not a clinical trial");
    };

    println!("{}", controller.trial_match_report(trial).await?);
    Ok(())
}

fn print_console_help() {
    println!("Available commands:");
    println!("  /help, /h              - Show this help");
    println!("  /login <email> <pw>    - Sign in");
    println!("  /logout                - Sign out");
    println!("  /whoami, /me           - Show the signed-in user");
    println!("  /trials, /t <query>    - Search clinical trials");
    println!("  /pubs, /p <query>      - Search publications");
    println!("  /experts, /e <query>   - Search experts");
    println!("  /match, /m             - Trials for your conditions");
    println!("  /report <n>            - Match report for trial n");
    println!("  /save, /s <n>          - Save or unsave result n");
    println!("  /favorites, /f         - List favorites");
    println!("  /summarize <text>      - Plain-language summary");
    println!("  /forum [category]      - List forum posts");
    println!("  /quit, /exit, /q       - Exit console");
}

fn whoami(controller: &AppController) {
    let Some(user) = controller.user() else {
        println!("Not signed in.");
        return;
    };

    println!("{} <{}> ({})", user.name, user.email, user.user_type);
    match controller.profile() {
        Some(Profile::Patient(patient)) => {
            let conditions = if patient.medical_conditions.is_empty() {
                "none listed".to_string()
            } else {
                patient.medical_conditions.join(", ")
            };
            println!("  Conditions: {conditions}");
            if !patient.additional_info.is_empty() {
                println!("  Notes: {}", patient.additional_info);
            }
        }
        Some(Profile::Researcher(researcher)) => {
            println!("  Specialty: {}", researcher.specialty);
            println!("  Institution: {}", researcher.institution);
            if let Some(orcid) = &researcher.orcid {
                println!("  ORCID: {orcid}");
            }
        }
        None => println!("  No profile saved."),
    }
    println!("  Favorites: {}", controller.favorites().len());
}

fn print_trials(trials: &[ClinicalTrial]) {
    if trials.is_empty() {
        println!("No trials found");
        return;
    }
    for (position, trial) in trials.iter().enumerate() {
        println!("{:>2}. [{}] {}", position + 1, trial.id, trial.title);
        println!(
            "    Status: {}  Location: {}  Contact: {}",
            trial.status, trial.location, trial.contact
        );
    }
}

fn print_publications(publications: &[Publication]) {
    if publications.is_empty() {
        println!("No publications found");
        return;
    }
    for (position, publication) in publications.iter().enumerate() {
        let authors = if publication.authors.len() > 2 {
            format!("{} et al.", publication.authors[..2].join(", "))
        } else {
            publication.authors.join(", ")
        };
        println!("{:>2}. {}", position + 1, publication.title);
        println!("    {} - {} ({})", authors, publication.journal, publication.year);
        println!("    {}", publication.url);
    }
}

fn print_experts(experts: &[Expert]) {
    if experts.is_empty() {
        println!("No experts found");
        return;
    }
    for (position, expert) in experts.iter().enumerate() {
        println!(
            "{:>2}. {} ({} publications) - {}",
            position + 1,
            expert.name,
            expert.publications,
            expert.location_label()
        );
        if !expert.specialties.is_empty() {
            println!("    {}", expert.specialties.join(", "));
        }
    }
}

fn print_favorites(favorites: &[FavoriteItem]) {
    if favorites.is_empty() {
        println!("No favorites saved");
        return;
    }
    for (position, favorite) in favorites.iter().enumerate() {
        println!("{:>2}. {:<12} {}", position + 1, favorite.kind(), favorite.label());
    }
}

fn print_posts(posts: &[ForumPost]) {
    if posts.is_empty() {
        println!("No forum posts found");
        return;
    }
    for post in posts {
        println!("[{}] {} - {}", post.category, post.title, post.id);
        println!(
            "    by {} ({}), {}",
            post.author,
            post.user_type,
            post.created_at.format("%Y-%m-%d")
        );
        for reply in &post.replies {
            println!("    > {}: {}", reply.author, reply.content);
        }
    }
}
