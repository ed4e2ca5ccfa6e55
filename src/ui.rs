use std::io::{self, IsTerminal};

use crate::domain::task::Task;

pub fn print_task_list(tasks: &[Task]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Tasks"));

    if tasks.is_empty() {
        println!("{}", palette.dim("no tasks yet"));
        return;
    }

    for task in tasks {
        println!("{}", format_task_row(task, &palette));
    }
    let pending = tasks.iter().filter(|task| !task.synced).count();
    let mut footer = format!("{} task(s)", tasks.len());
    if pending > 0 {
        footer.push_str(&format!(", {pending} not yet synced"));
    }
    println!("{}", palette.dim(&footer));
}

pub fn print_task_show(task: &Task) {
    let palette = Palette::auto();
    println!("{}", format_task_row(task, &palette));
    if !task.description.is_empty() {
        println!("  {}", task.description);
    }
}

fn format_task_row(task: &Task, palette: &Palette) -> String {
    let mut line = format!(
        "{} {} {}",
        palette.checkbox(task.completed),
        palette.id(&task.id),
        task.title
    );
    if !task.synced {
        line.push(' ');
        line.push_str(&palette.unsynced("(unsynced)"));
    }
    line
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn checkbox(&self, completed: bool) -> String {
        if completed {
            self.paint("32", "[x]")
        } else {
            self.paint("37", "[ ]")
        }
    }

    fn unsynced(&self, text: &str) -> String {
        self.paint("33", text)
    }
}
