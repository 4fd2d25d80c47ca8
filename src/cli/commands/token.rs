use clap::Subcommand;
use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Token with the ADMIN role")]
    Admin {
        #[arg(long, default_value = "admin", help = "Subject claim")]
        sub: String,
    },

    #[command(about = "Token with the STUDENT role")]
    Student {
        #[arg(help = "Student id")]
        student_id: i64,
        #[arg(long, help = "Subject claim (defaults to student-<id>)")]
        sub: Option<String>,
    },

    #[command(about = "Token with the TEACHER role")]
    Teacher {
        #[arg(help = "Teacher id")]
        teacher_id: i64,
        #[arg(long, help = "Subject claim (defaults to teacher-<id>)")]
        sub: Option<String>,
    },
}

fn claims_for(cmd: TokenCommands) -> Claims {
    match cmd {
        TokenCommands::Admin { sub } => Claims::admin(sub),
        TokenCommands::Student { student_id, sub } => {
            Claims::student(sub.unwrap_or_else(|| format!("student-{}", student_id)), student_id)
        }
        TokenCommands::Teacher { teacher_id, sub } => {
            Claims::teacher(sub.unwrap_or_else(|| format!("teacher-{}", teacher_id)), teacher_id)
        }
    }
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let claims = claims_for(cmd);
    let token = generate_jwt(&claims)?;

    match output_format {
        OutputFormat::Text => {
            // Bare token so it can be captured with $(school token ...)
            println!("{}", token);
            Ok(())
        }
        OutputFormat::Json => output_success(
            &output_format,
            &format!("Issued {} token", claims.role.as_str()),
            Some(json!({
                "token": token,
                "sub": claims.sub,
                "role": claims.role,
                "expiresAt": claims.exp,
            })),
        ),
    }
}
