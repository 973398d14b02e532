//! CLI command handlers

use super::output::OutputFormat;
use crate::FillArgs;
use formgate_client::{
    BoundFile, ClientConfig, FillReport, FillSession, FormError, FormsApi, Result, SubmitOutcome, Widget,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};

#[derive(Serialize)]
struct QuestionView<'a> {
    id: &'a str,
    question: &'a str,
    required: bool,
    answer_type: String,
    widget: Widget,
}

#[derive(Serialize)]
struct FormView<'a> {
    id: &'a str,
    name: &'a str,
    questions: Vec<QuestionView<'a>>,
}

/// `formgate show <form-id>`
pub async fn show(config: &ClientConfig, form_id: &str, format: OutputFormat) -> Result<()> {
    let api = FormsApi::new(config)?;
    let form = api.fetch_form(form_id).await?;

    if !format.is_text() {
        let view = FormView {
            id: &form.id,
            name: &form.name,
            questions: form
                .questions()
                .map(|q| QuestionView {
                    id: &q.id,
                    question: &q.question,
                    required: q.required,
                    answer_type: q.answer_type.to_string(),
                    widget: q.widget(),
                })
                .collect(),
        };
        format.print(&view);
        return Ok(());
    }

    println!("{} ({})", form.name, form.id);
    for (index, q) in form.questions().enumerate() {
        let widget = q.widget();
        let marker = if q.required { " *" } else { "" };
        println!("\n{}. {}{}  [{}: {}]", index + 1, q.question, marker, q.answer_type, q.id);
        if let Some(reason) = &widget.disabled_reason {
            println!("   unavailable: {}", reason);
            continue;
        }
        for option in &widget.options {
            println!("   - {}", option);
        }
        if let Some(limit) = widget.max_input_len {
            println!("   up to {} characters", limit);
        }
        if let Some(accept) = &widget.accept {
            println!("   {}", accept.description());
        }
        if let Some(hint) = &widget.size_hint {
            println!("   {}", hint);
        }
    }
    Ok(())
}

/// `formgate fill <form-id> ...`
pub async fn fill(config: &ClientConfig, args: FillArgs, format: OutputFormat) -> Result<()> {
    let api = FormsApi::new(config)?;
    let form = api.fetch_form(&args.form_id).await?;
    let mut session = FillSession::new(form);
    if api.init_csrf().await.is_none() {
        tracing::warn!("No anti-forgery token yet; the first submit will request one");
    }

    if let Some(description) = &args.ai {
        let drafted = api.ai_fill(&session.form().id, description).await?;
        if !drafted.success {
            return Err(FormError::State("the server could not draft answers".into()));
        }
        print_report("AI fill", &session.apply_answers(&drafted.responses));
    }

    if let Some(path) = &args.answers {
        let content = tokio::fs::read_to_string(path).await?;
        let answers: HashMap<String, Value> = serde_json::from_str(&content)?;
        print_report(&path.display().to_string(), &session.apply_answers(&answers));
    }

    for binding in &args.files {
        let (question_id, path) = binding
            .split_once('=')
            .ok_or_else(|| FormError::Config(format!("expected QUESTION_ID=PATH, got '{}'", binding)))?;
        let file = BoundFile::from_path(path, None).await?;
        let result = session.attach_file(question_id, file)?;
        if let Some(message) = result.message {
            eprintln!("{}: {}", question_id, message);
        }
    }

    let readiness = session.readiness();
    println!(
        "Required answered: {}/{} ({:.0}%)",
        readiness.completed,
        readiness.required,
        readiness.percent()
    );

    if !session.can_submit() {
        session.reveal_errors();
        for q in session.form().questions() {
            if let Some(message) = session.error(&q.id) {
                eprintln!("  {}: {}", q.question, message);
            }
        }
        for issue in session.file_issues() {
            eprintln!("  {}: {}", issue.question, issue.message);
        }
        return Err(FormError::State("form is not ready to submit".into()));
    }

    session.open_gate()?;
    let code = match args.code {
        Some(code) => code,
        None => prompt("Access code: ")?,
    };
    session.enter_code(&code);

    if args.dry_run {
        let pending = session.begin_submit()?;
        format.print(&pending.submission.responses);
        session.cancel_gate();
        return Ok(());
    }

    match session.submit(&api).await? {
        SubmitOutcome::Submitted(response) => {
            if format.is_text() {
                println!("{}", response.message);
                if let Some(id) = &response.response_id {
                    println!("Response id: {}", id);
                }
            } else {
                format.print(&response);
            }
            Ok(())
        }
        SubmitOutcome::Failed { message } => Err(FormError::State(message)),
        SubmitOutcome::Superseded => Err(FormError::State("submission was superseded".into())),
    }
}

/// `formgate resend-code --email ...`
pub async fn resend_code(config: &ClientConfig, email: &str) -> Result<()> {
    let api = FormsApi::new(config)?;
    let detail = api.resend_code(email).await?;
    println!("{}", detail);
    Ok(())
}

fn print_report(source: &str, report: &FillReport) {
    println!("{}: applied {} answers", source, report.applied.len());
    for (id, reason) in &report.skipped {
        eprintln!("  skipped {}: {}", id, reason);
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
