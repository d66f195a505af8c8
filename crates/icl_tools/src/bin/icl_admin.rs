#![forbid(unsafe_code)]

use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use icl_tools::credentials_cli::execute_credentials_command;

const USAGE: &str =
    "usage: icl_admin credentials <user-add|user-del|user-ls|cookie-init> [username] [display name]";

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

fn run() -> Result<(), String> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args[0] != "credentials" {
        return Err(USAGE.to_string());
    }

    let subcommand = args.get(1).ok_or_else(|| USAGE.to_string())?.as_str();
    let username = args.get(2).map(String::as_str);
    let display_name = args.get(3).map(String::as_str);
    let password = if subcommand == "user-add" {
        let username =
            username.ok_or_else(|| "usage: icl_admin credentials user-add <username> <display name>".to_string())?;
        Some(read_password(username)?)
    } else {
        None
    };

    let path = credentials_path();
    let output =
        execute_credentials_command(&path, subcommand, username, display_name, password.as_deref())?;
    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn credentials_path() -> PathBuf {
    env::var("ICL_CREDENTIALS_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("icl_credentials.json"))
}

fn read_password(username: &str) -> Result<String, String> {
    if io::stdin().is_terminal() {
        let prompt = format!("Enter password for {username}:");
        let value = rpassword::prompt_password(prompt).map_err(|e| e.to_string())?;
        if value.trim().is_empty() {
            return Err("password must not be empty".to_string());
        }
        Ok(value)
    } else {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .map_err(|e| e.to_string())?;
        let trimmed = input.trim().to_string();
        if trimmed.is_empty() {
            return Err("password must not be empty".to_string());
        }
        Ok(trimmed)
    }
}
