mod app;
mod cli;
mod config;
mod db;
mod domain;
mod remote;
mod session;
mod store;
mod sync;
#[cfg(test)]
mod testing;
mod ui;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("json serialization should work")
    );
}

fn run() -> Result<(), app::AppError> {
    use clap::Parser;

    let cli = cli::Cli::parse();
    let file = config::ConfigFile::load(&cli.config)?;
    let settings = config::Settings::resolve(cli.db.as_deref(), cli.remote.as_deref(), &file);
    let app = app::App::open(&settings)?;
    let events = app.subscribe();

    let result = dispatch(&app, cli.command);
    app.close();
    report_pending_pushes(events.try_iter());
    result
}

/// Background pushes never fail the command; leftover local-only changes
/// are only noted on stderr.
fn report_pending_pushes(events: impl Iterator<Item = sync::SyncEvent>) {
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for event in events {
        match event {
            sync::SyncEvent::Pushed {
                outcome: sync::PushOutcome::SkippedNoIdentity,
                ..
            } => skipped += 1,
            sync::SyncEvent::Pushed {
                outcome: sync::PushOutcome::Failed(_),
                ..
            } => failed += 1,
            _ => {}
        }
    }
    if skipped > 0 {
        eprintln!("note: {skipped} change(s) saved locally only (not signed in)");
    }
    if failed > 0 {
        eprintln!("note: {failed} change(s) could not be pushed and stay unsynced");
    }
}

fn dispatch(app: &app::App, command: cli::Commands) -> Result<(), app::AppError> {
    use cli::Commands;

    match command {
        Commands::Add(args) => {
            let task = app.create_task(&args.title, args.desc.as_deref())?;
            println!("created {} {}", task.id, task.title);
        }
        Commands::Ls(args) => {
            let tasks = app.list_tasks()?;
            if args.json {
                print_json(&tasks);
            } else {
                ui::print_task_list(&tasks);
            }
        }
        Commands::Show(args) => match app.show_task(&args.id)? {
            Some(task) => {
                if args.json {
                    print_json(&task);
                } else {
                    ui::print_task_show(&task);
                }
            }
            None => return Err(app::AppError::NotFound(args.id)),
        },
        Commands::Edit(args) => {
            let task = app.edit_task(&args.id, args.title.as_deref(), args.desc.as_deref())?;
            println!("updated {} {}", task.id, task.title);
        }
        Commands::Done(args) => {
            let task = app.complete_task(&args.id)?;
            println!("completed {} {}", task.id, task.title);
        }
        Commands::Rm(args) => {
            app.delete_task(&args.id)?;
            println!("deleted {}", args.id);
        }
        Commands::Refresh(args) => {
            let outcome = app.refresh()?;
            if args.json {
                print_json(&outcome);
            } else {
                match outcome {
                    sync::ReconcileOutcome::NoIdentity => {
                        return Err(app::AppError::Auth(remote::RemoteError::NotSignedIn));
                    }
                    sync::ReconcileOutcome::Replaced { count } => {
                        println!("synced {count} task(s) from remote");
                    }
                }
            }
        }
        Commands::Login(args) => {
            let summary = app.sign_in(&args.email, &args.password)?;
            let who = summary
                .identity
                .as_ref()
                .and_then(|identity| identity.email.clone())
                .unwrap_or_else(|| args.email.trim().to_string());
            match summary.pull {
                Some(sync::ReconcileOutcome::Replaced { count }) => {
                    println!("signed in as {who}; pulled {count} task(s)");
                }
                _ => println!("signed in as {who}; remote tasks not pulled yet"),
            }
        }
        Commands::Register(args) => {
            app.sign_up(&args.email, &args.password)?;
            println!("account created; now run `tasksync login`");
        }
        Commands::Logout => {
            app.sign_out()?;
            println!("signed out");
        }
        Commands::Whoami(args) => {
            let identity = app.whoami();
            if args.json {
                print_json(&identity);
            } else {
                match identity {
                    Some(identity) => println!(
                        "{} ({})",
                        identity.email.as_deref().unwrap_or("unknown email"),
                        identity.id
                    ),
                    None => println!("not signed in"),
                }
            }
        }
    }

    Ok(())
}
