//! Goaltracker CLI
//!
//! Command-line client for a running Goaltracker API server:
//! - Sign in, sign up and sign out
//! - Manage goals and export them as CSV
//! - Show the month calendar
//! - Search users and handle friend requests

use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use goaltracker::calendar::CalendarMonth;
use reqwest::{Client, Method, RequestBuilder};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "goaltracker")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Track goals, streaks and friends from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8085", global = true)]
    pub api_url: String,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with e-mail and password
    SignIn {
        email: String,
        #[arg(short, long)]
        password: String,
        /// Do not keep the session across server restarts
        #[arg(long)]
        forget: bool,
    },

    /// Create an account
    SignUp {
        email: String,
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Sign out
    SignOut,

    /// Show the signed-in user and login streak
    Whoami,

    /// Manage goals
    Goals {
        #[command(subcommand)]
        command: GoalCommands,
    },

    /// Show a month calendar of goals
    Calendar {
        /// Month as YYYY-MM (default: current month)
        #[arg(short, long)]
        month: Option<String>,
    },

    /// Friends and friend requests
    Friends {
        #[command(subcommand)]
        command: FriendCommands,
    },

    /// Visit streak and the last 7 days
    Activity,

    /// Show server status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum GoalCommands {
    /// List goals
    List {
        /// all, not_started, in_progress or completed
        #[arg(short, long)]
        status: Option<String>,
        /// due_date or priority
        #[arg(long)]
        sort: Option<String>,
    },
    /// Add a goal
    Add {
        title: String,
        /// Due date (YYYY-MM-DD)
        #[arg(short, long)]
        due: String,
        /// low, medium or high
        #[arg(short, long, default_value = "medium")]
        priority: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change the status of a goal
    Status { id: String, status: String },
    /// Set progress (0-100)
    Progress { id: String, value: i64 },
    /// Delete a goal
    Rm { id: String },
    /// Export goals as CSV
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum FriendCommands {
    /// List friends
    List,
    /// Search users by name
    Search { query: String },
    /// Send a friend request
    Add { user_id: String },
    /// Pending incoming requests
    Requests,
    /// Accept a request
    Accept { request_id: String },
    /// Reject a request
    Reject { request_id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let api = Api {
        client: Client::new(),
        base: cli.api_url.trim_end_matches('/').to_string(),
    };
    let json_output = cli.format == "json";

    match cli.command {
        Commands::SignIn {
            email,
            password,
            forget,
        } => {
            let body = json!({"email": email, "password": password, "remember_me": !forget});
            let session = api.send(Method::POST, "/api/v1/auth/sign-in", Some(body)).await?;
            if json_output {
                print_json(&session)?;
            } else {
                println!(
                    "Signed in as {} (login streak: {} days)",
                    session["username"].as_str().unwrap_or(&email),
                    session["login_streak"].as_u64().unwrap_or(0)
                );
            }
        }

        Commands::SignUp {
            email,
            username,
            password,
        } => {
            let body = json!({"email": email, "password": password, "username": username});
            let result = api.send(Method::POST, "/api/v1/auth/sign-up", Some(body)).await?;
            if json_output {
                print_json(&result)?;
            } else if result["confirmation_required"].as_bool().unwrap_or(false) {
                println!("Account created. Check {} to confirm it, then sign in.", email);
            } else {
                println!("Welcome, {}!", username);
            }
        }

        Commands::SignOut => {
            api.send(Method::POST, "/api/v1/auth/sign-out", None).await?;
            println!("Signed out");
        }

        Commands::Whoami => {
            let session = api.send(Method::GET, "/api/v1/auth/session", None).await?;
            if json_output {
                print_json(&session)?;
            } else {
                println!("User:    {}", session["username"].as_str().unwrap_or("-"));
                println!("E-mail:  {}", session["email"].as_str().unwrap_or("-"));
                println!("Streak:  {} days", session["login_streak"].as_u64().unwrap_or(0));
            }
        }

        Commands::Goals { command } => run_goals(&api, command, json_output).await?,

        Commands::Calendar { month } => {
            let mut path = "/api/v1/calendar".to_string();
            if let Some(month) = month {
                let month: CalendarMonth = month.parse()?;
                path.push_str(&format!("?year={}&month={}", month.year, month.month));
            }
            let grid = api.send(Method::GET, &path, None).await?;
            if json_output {
                print_json(&grid)?;
            } else {
                print_calendar(&grid);
            }
        }

        Commands::Friends { command } => run_friends(&api, command, json_output).await?,

        Commands::Activity => {
            let activity = api.send(Method::GET, "/api/v1/activity", None).await?;
            if json_output {
                print_json(&activity)?;
            } else {
                println!("Streak: {} days", activity["streak"].as_u64().unwrap_or(0));
                println!("Visits: {}", activity["total_visits"].as_u64().unwrap_or(0));
                println!();
                for day in activity["weekly"].as_array().into_iter().flatten() {
                    let visits = day["visits"].as_u64().unwrap_or(0);
                    println!(
                        "{}  {}",
                        day["date"].as_str().unwrap_or("-"),
                        "#".repeat(visits.min(40) as usize)
                    );
                }
            }
        }

        Commands::Status => {
            let response = api.client.get(format!("{}/health", api.base)).send().await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: Value = resp.json().await?;

                    println!("Goaltracker v{}", env!("CARGO_PKG_VERSION"));
                    println!();
                    println!("API Status: {}", health["status"].as_str().unwrap_or("unknown"));
                    println!(
                        "Backend:    {} ({})",
                        health["backend"].as_str().unwrap_or("unknown"),
                        health["backend_status"].as_str().unwrap_or("unknown")
                    );
                    println!(
                        "Signed in:  {}",
                        if health["authenticated"].as_bool().unwrap_or(false) { "yes" } else { "no" }
                    );

                    if let Some(uptime) = health["uptime_seconds"].as_u64() {
                        println!();
                        println!("Uptime: {}", format_duration(uptime));
                    }
                }
                Ok(resp) => {
                    eprintln!("API returned error: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Cannot connect to Goaltracker API at {}", api.base);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Make sure the API server is running:");
                    eprintln!("  cargo run --bin goaltracker");
                    std::process::exit(1);
                }
            }
        }

        Commands::Config { output } => {
            let config = goaltracker::config::generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

async fn run_goals(
    api: &Api,
    command: GoalCommands,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        GoalCommands::List { status, sort } => {
            let mut query = Vec::new();
            if let Some(status) = status {
                query.push(format!("status={}", urlencoding::encode(&status)));
            }
            if let Some(sort) = sort {
                query.push(format!("sort={}", urlencoding::encode(&sort)));
            }
            let path = if query.is_empty() {
                "/api/v1/goals".to_string()
            } else {
                format!("/api/v1/goals?{}", query.join("&"))
            };

            let goals = api.send(Method::GET, &path, None).await?;
            if json_output {
                print_json(&goals)?;
            } else {
                print_goals(&goals);
            }
        }

        GoalCommands::Add {
            title,
            due,
            priority,
            description,
        } => {
            let due = NaiveDate::parse_from_str(&due, "%Y-%m-%d")
                .map_err(|_| format!("Invalid due date (expected YYYY-MM-DD): {}", due))?;
            let due = due
                .and_hms_opt(0, 0, 0)
                .map(|d| Utc.from_utc_datetime(&d))
                .ok_or("Invalid due date")?;

            let body = json!({
                "title": title,
                "description": description,
                "due_date": due.to_rfc3339(),
                "priority": priority.to_lowercase(),
            });
            let goal = api.send(Method::POST, "/api/v1/goals", Some(body)).await?;
            if json_output {
                print_json(&goal)?;
            } else {
                println!("Added goal {} ({})", goal["title"].as_str().unwrap_or("-"), goal["id"].as_str().unwrap_or("-"));
            }
        }

        GoalCommands::Status { id, status } => {
            let status = status.to_lowercase().replace('-', "_");
            let goal = api
                .send(Method::PATCH, &format!("/api/v1/goals/{}", id), Some(json!({"status": status})))
                .await?;
            println!("{} is now {}", goal["title"].as_str().unwrap_or(&id), status);
        }

        GoalCommands::Progress { id, value } => {
            let goal = api
                .send(Method::PATCH, &format!("/api/v1/goals/{}", id), Some(json!({"progress": value})))
                .await?;
            println!("{} is {}% done", goal["title"].as_str().unwrap_or(&id), value);
        }

        GoalCommands::Rm { id } => {
            api.send(Method::DELETE, &format!("/api/v1/goals/{}", id), None).await?;
            println!("Deleted goal {}", id);
        }

        GoalCommands::Export { output } => {
            let goals = api.send(Method::GET, "/api/v1/goals", None).await?;
            let csv = goals_to_csv(&goals)?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &csv)?;
                    println!("Exported to {:?}", path);
                }
                None => {
                    print!("{}", csv);
                }
            }
        }
    }

    Ok(())
}

async fn run_friends(
    api: &Api,
    command: FriendCommands,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        FriendCommands::List => {
            let friends = api.send(Method::GET, "/api/v1/friends", None).await?;
            if json_output {
                return print_json(&friends);
            }
            let friends = friends.as_array().cloned().unwrap_or_default();
            if friends.is_empty() {
                println!("No friends yet. Find someone with:");
                println!("  goaltracker friends search <name>");
                return Ok(());
            }
            println!("{:<20} {:<8} {}", "Username", "Online", "ID");
            println!("{}", "-".repeat(66));
            for friend in friends {
                println!(
                    "{:<20} {:<8} {}",
                    friend["username"].as_str().unwrap_or("-"),
                    if friend["is_online"].as_bool().unwrap_or(false) { "yes" } else { "no" },
                    friend["friend_id"].as_str().unwrap_or("-")
                );
            }
        }

        FriendCommands::Search { query } => {
            let path = format!("/api/v1/users/search?q={}", urlencoding::encode(&query));
            let results = api.send(Method::GET, &path, None).await?;
            if json_output {
                return print_json(&results);
            }
            let hits = results["results"].as_array().cloned().unwrap_or_default();
            if hits.is_empty() {
                println!("No users found for '{}'", query);
                return Ok(());
            }
            println!("{:<20} {:<10} {}", "Username", "Request", "ID");
            println!("{}", "-".repeat(68));
            for hit in hits {
                println!(
                    "{:<20} {:<10} {}",
                    hit["username"].as_str().unwrap_or("-"),
                    hit["request"]["state"].as_str().unwrap_or("idle"),
                    hit["id"].as_str().unwrap_or("-")
                );
            }
        }

        FriendCommands::Add { user_id } => {
            api.send(
                Method::POST,
                "/api/v1/friends/requests",
                Some(json!({"receiver_id": user_id})),
            )
            .await?;
            println!("Request Sent");
        }

        FriendCommands::Requests => {
            let requests = api.send(Method::GET, "/api/v1/friends/requests", None).await?;
            if json_output {
                return print_json(&requests);
            }
            let requests = requests.as_array().cloned().unwrap_or_default();
            if requests.is_empty() {
                println!("No pending friend requests");
                return Ok(());
            }
            for request in requests {
                println!(
                    "{}  from {}",
                    request["id"].as_str().unwrap_or("-"),
                    request["sender"]["username"].as_str().unwrap_or("unknown user")
                );
            }
        }

        FriendCommands::Accept { request_id } => {
            api.send(
                Method::POST,
                &format!("/api/v1/friends/requests/{}/accept", request_id),
                None,
            )
            .await?;
            println!("Friend request accepted");
        }

        FriendCommands::Reject { request_id } => {
            api.send(
                Method::POST,
                &format!("/api/v1/friends/requests/{}/reject", request_id),
                None,
            )
            .await?;
            println!("Friend request rejected");
        }
    }

    Ok(())
}

struct Api {
    client: Client,
    base: String,
}

impl Api {
    /// Send a request; non-2xx answers print the server message and exit
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, Box<dyn std::error::Error>> {
        let mut request: RequestBuilder = self.client.request(method, format!("{}{}", self.base, path));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                eprintln!("Cannot connect to Goaltracker API at {}: {}", self.base, e);
                std::process::exit(1);
            }
        };

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(text);
            eprintln!("Failed ({}): {}", status, message);
            std::process::exit(1);
        }

        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_goals(goals: &Value) {
    let goals = match goals.as_array() {
        Some(g) if !g.is_empty() => g,
        _ => {
            println!("No goals yet. Add one with:");
            println!("  goaltracker goals add \"Run 5k\" --due 2024-06-01");
            return;
        }
    };

    println!(
        "{:<36} {:<28} {:<12} {:<8} {:<12} {}",
        "ID", "Title", "Due", "Priority", "Status", "Progress"
    );
    println!("{}", "-".repeat(110));

    for goal in goals {
        let due = goal["due_date"]
            .as_str()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36} {:<28} {:<12} {:<8} {:<12} {}%",
            goal["id"].as_str().unwrap_or("-"),
            truncate(goal["title"].as_str().unwrap_or("-"), 28),
            due,
            goal["priority"].as_str().unwrap_or("-"),
            goal["status"].as_str().unwrap_or("-"),
            goal["progress"].as_u64().unwrap_or(0)
        );
    }
}

fn goals_to_csv(goals: &Value) -> Result<String, Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "id",
        "title",
        "description",
        "due_date",
        "priority",
        "status",
        "progress",
    ])?;

    for goal in goals.as_array().into_iter().flatten() {
        let progress = goal["progress"].as_u64().unwrap_or(0).to_string();
        writer.write_record([
            goal["id"].as_str().unwrap_or(""),
            goal["title"].as_str().unwrap_or(""),
            goal["description"].as_str().unwrap_or(""),
            goal["due_date"].as_str().unwrap_or(""),
            goal["priority"].as_str().unwrap_or(""),
            goal["status"].as_str().unwrap_or(""),
            progress.as_str(),
        ])?;
    }

    Ok(String::from_utf8(writer.into_inner()?)?)
}

/// Six week rows; days outside the month are dimmed with dots
fn print_calendar(grid: &Value) {
    let cells = grid["cells"].as_array().cloned().unwrap_or_default();
    if let (Some(year), Some(month)) = (grid["month"]["year"].as_i64(), grid["month"]["month"].as_u64()) {
        println!("{:^35}", format!("{:04}-{:02}", year, month));
    }
    println!(" Sun  Mon  Tue  Wed  Thu  Fri  Sat");

    for week in cells.chunks(7) {
        let line: Vec<String> = week
            .iter()
            .map(|cell| {
                let day = cell["date"]
                    .as_str()
                    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                    .map(|d| d.format("%e").to_string())
                    .unwrap_or_else(|| "  ".to_string());
                let marker = match cell["tone"].as_str() {
                    Some("all_completed") => '*',
                    Some("some_completed") => '+',
                    Some("in_progress") => '~',
                    Some("open") => 'o',
                    _ => ' ',
                };
                if cell["in_current_month"].as_bool().unwrap_or(false) {
                    let today = if cell["is_today"].as_bool().unwrap_or(false) { '>' } else { ' ' };
                    format!("{}{}{}", today, day, marker)
                } else {
                    " .. ".to_string()
                }
            })
            .collect();
        println!(" {}", line.join(" ").trim_end());
    }

    println!();
    println!("o open  ~ in progress  + some completed  * all completed");
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
