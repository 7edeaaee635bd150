use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

use crate::error::Result;
use crate::grouping::DayGroup;
use crate::metrics::Metrics;
use crate::model::{Priority, Project, Status, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
    Minimal,
}

/// Serialize `value` as one JSON line, or indented for pretty output.
pub fn print_value<T: Serialize + ?Sized>(value: &T, format: Format) -> Result<()> {
    match format {
        Format::Pretty => println!("{}", serde_json::to_string_pretty(value)?),
        Format::Json | Format::Minimal => println!("{}", serde_json::to_string(value)?),
    }
    Ok(())
}

pub fn truncate_name(name: &str, max_len: usize) -> String {
    if name.chars().count() > max_len {
        let truncated: String = name.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    } else {
        name.to_string()
    }
}

fn status_colored(status: Status) -> String {
    let text = status.to_string();
    match status {
        Status::Done => text.green().to_string(),
        Status::InProgress => text.yellow().to_string(),
        Status::Waiting => text.magenta().to_string(),
        Status::Archived => text.dimmed().to_string(),
        Status::NotStarted | Status::Planned => text,
    }
}

fn priority_marker(priority: Priority) -> String {
    match priority {
        Priority::High => "!!".red().bold().to_string(),
        Priority::Medium => "! ".yellow().to_string(),
        Priority::Low => "  ".to_string(),
    }
}

fn minimal_row(task: &Task) -> String {
    let due = task
        .due_date
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into());
    format!(
        "{:>5} {:24} {:12} {:6} {}",
        task.id,
        truncate_name(&task.name, 24),
        task.status,
        task.priority,
        due
    )
}

fn minimal_header() {
    println!(
        "{:>5} {:24} {:12} {:6} DUE",
        "ID", "NAME", "STATUS", "PRIO"
    );
    println!("{}", "-".repeat(64));
}

fn pretty_line(task: &Task) -> String {
    let mut line = format!(
        "{} [{}] {} ({})",
        priority_marker(task.priority),
        task.id,
        task.name.bold(),
        status_colored(task.status)
    );
    if let Some(due) = task.due_date {
        line.push_str(&format!("  due {}", due.format("%Y-%m-%d %H:%M UTC")));
    }
    if !task.tags.is_empty() {
        line.push_str(&format!("  #{}", task.tags.join(" #")).cyan().to_string());
    }
    if task.is_occurrence() {
        line.push_str(&" (recurring)".dimmed().to_string());
    }
    line
}

pub fn print_task(task: &Task, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(task)?),
        Format::Pretty => {
            println!("{}", pretty_line(task));
            if let Some(ref desc) = task.description {
                println!("     {}", desc);
            }
        }
        Format::Minimal => println!("{}", minimal_row(task)),
    }
    Ok(())
}

pub fn print_tasks(tasks: &[Task], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(tasks)?),
        Format::Pretty => {
            if tasks.is_empty() {
                println!("{}", "nothing here".dimmed());
            }
            for task in tasks {
                println!("{}", pretty_line(task));
            }
        }
        Format::Minimal => {
            minimal_header();
            for task in tasks {
                println!("{}", minimal_row(task));
            }
        }
    }
    Ok(())
}

pub fn print_projects(projects: &[Project], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(projects)?),
        Format::Pretty | Format::Minimal => {
            for project in projects {
                let due = project
                    .due_date
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "-".into());
                println!("{:>5} {:32} {}", project.id, truncate_name(&project.name, 32), due);
            }
        }
    }
    Ok(())
}

pub fn print_groups(groups: &[DayGroup], format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(groups)?),
        Format::Pretty => {
            for group in groups {
                println!("{} {}", group.label.bold().underline(), format!("({})", group.tasks.len()).dimmed());
                for task in &group.tasks {
                    println!("  {}", pretty_line(task));
                }
                println!();
            }
        }
        Format::Minimal => {
            for group in groups {
                println!("== {} ==", group.label);
                for task in &group.tasks {
                    println!("{}", minimal_row(task));
                }
            }
        }
    }
    Ok(())
}

fn print_section(title: &str, tasks: &[Task]) {
    if tasks.is_empty() {
        return;
    }
    println!("{}", title.bold());
    for task in tasks {
        println!("  {}", pretty_line(task));
    }
}

pub fn print_metrics(metrics: &Metrics, format: Format) -> Result<()> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(metrics)?),
        Format::Pretty => {
            println!(
                "{} open, {} pending over a month, {} completed today ({})",
                metrics.total_open_tasks.to_string().bold(),
                metrics.pending_over_month,
                metrics.completed_today.len().to_string().green(),
                metrics.timezone.dimmed()
            );
            print_section("In progress", &metrics.in_progress);
            print_section("Today", &metrics.today_plan);
            print_section("Due today", &metrics.due_today);
            print_section("Suggested", &metrics.suggested_tasks);
            println!("{}", "Last 7 days".bold());
            for day in &metrics.weekly_completions {
                println!(
                    "  {} {:>3} {}",
                    day.date.format("%a %m-%d"),
                    day.count,
                    "#".repeat(day.count.min(40)).green()
                );
            }
        }
        Format::Minimal => {
            let weekly: Vec<String> = metrics
                .weekly_completions
                .iter()
                .map(|d| d.count.to_string())
                .collect();
            println!(
                "open={} pending={} in_progress={} today={} due_today={} done_today={} suggested={} week={}",
                metrics.total_open_tasks,
                metrics.pending_over_month,
                metrics.in_progress.len(),
                metrics.today_plan.len(),
                metrics.due_today.len(),
                metrics.completed_today.len(),
                metrics.suggested_tasks.len(),
                weekly.join(",")
            );
        }
    }
    Ok(())
}
