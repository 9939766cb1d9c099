//! 交互式菜单循环
//!
//! 显式的读取循环：显示菜单 → 读取选项 → 调用 `TaskStore` → 打印结果 → 停顿后重来，
//! 直到用户选择退出或输入结束。所有错误都在单次操作内消化，循环本身不会因此中断。

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};

use crate::error::TaskError;
use crate::storage::config::MenuConfig;
use crate::storage::KeyValueStore;
use crate::store::{Task, TaskStore};

/// 菜单选项
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Add,
    List,
    Toggle,
    Remove,
    Rename,
    Search,
    Exit,
}

impl MenuChoice {
    /// 解析 "1".."7"，其余返回 `None`
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(Self::Add),
            "2" => Some(Self::List),
            "3" => Some(Self::Toggle),
            "4" => Some(Self::Remove),
            "5" => Some(Self::Rename),
            "6" => Some(Self::Search),
            "7" => Some(Self::Exit),
            _ => None,
        }
    }
}

const MENU_TEXT: &str = "\
Task Manager Menu:
1. Add Task
2. View All Tasks
3. Toggle Task Completion
4. Remove Task
5. Update Task Description
6. Search Tasks
7. Exit";

/// 解析任务 ID：去掉首尾空白后必须是正整数
fn parse_id(input: &str) -> Option<u32> {
    input.trim().parse::<u32>().ok().filter(|&id| id > 0)
}

/// 菜单循环，输入输出可替换以便测试
pub struct Menu<S: KeyValueStore, R: BufRead, W: Write> {
    store: TaskStore<S>,
    input: R,
    output: W,
    config: MenuConfig,
}

impl<S: KeyValueStore, R: BufRead, W: Write> Menu<S, R, W> {
    pub fn new(store: TaskStore<S>, input: R, output: W, config: MenuConfig) -> Self {
        Self {
            store,
            input,
            output,
            config,
        }
    }

    /// 运行到退出为止；只有终端 I/O 失败才返回错误
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            writeln!(self.output)?;
            writeln!(self.output, "{}", MENU_TEXT)?;

            let choice = match self.prompt("Choose an option (1-7):")? {
                Some(line) if !line.trim().is_empty() => line,
                _ => {
                    writeln!(self.output, "No input received. Exiting...")?;
                    break;
                }
            };

            match MenuChoice::parse(&choice) {
                Some(MenuChoice::Exit) => {
                    writeln!(self.output, "Exiting...")?;
                    break;
                }
                Some(choice) => self.handle(choice)?,
                None => writeln!(self.output, "Invalid choice, try again.")?,
            }

            self.pause();
        }
        self.output.flush()
    }

    #[cfg(test)]
    pub fn into_store(self) -> TaskStore<S> {
        self.store
    }

    fn handle(&mut self, choice: MenuChoice) -> io::Result<()> {
        match choice {
            MenuChoice::Add => self.add(),
            MenuChoice::List => self.list(),
            MenuChoice::Toggle => self.toggle(),
            MenuChoice::Remove => self.remove(),
            MenuChoice::Rename => self.rename(),
            MenuChoice::Search => self.search(),
            MenuChoice::Exit => Ok(()),
        }
    }

    fn add(&mut self) -> io::Result<()> {
        let Some(description) = self.prompt_text("Enter task description:")? else {
            return writeln!(self.output, "Task description cannot be empty.");
        };
        match self.store.add(description.as_str()) {
            Ok(id) => writeln!(
                self.output,
                "Task \"{}\" added successfully with ID {}.",
                description, id
            ),
            Err(e) => self.report(e),
        }
    }

    fn list(&mut self) -> io::Result<()> {
        self.clear_screen()?;
        if self.store.list().is_empty() {
            return writeln!(self.output, "No tasks available.");
        }
        writeln!(self.output)?;
        writeln!(self.output, "Task List:")?;
        write_tasks(&mut self.output, self.store.list().iter())?;
        writeln!(self.output)
    }

    fn toggle(&mut self) -> io::Result<()> {
        let Some(id) = self.prompt_id("Enter task ID to toggle completion:")? else {
            return Ok(());
        };
        match self.store.toggle(id) {
            Ok(_) => {
                let label = self.store.get(id).map_or("", Task::status_label);
                writeln!(self.output, "Task {} is now {}.", id, label)
            }
            Err(e) => self.report(e),
        }
    }

    fn remove(&mut self) -> io::Result<()> {
        let Some(id) = self.prompt_id("Enter task ID to remove:")? else {
            return Ok(());
        };
        match self.store.remove(id) {
            Ok(_) => writeln!(self.output, "Task {} removed.", id),
            Err(e) => self.report(e),
        }
    }

    fn rename(&mut self) -> io::Result<()> {
        let Some(id) = self.prompt_id("Enter task ID to update:")? else {
            return Ok(());
        };
        let Some(description) = self.prompt_text("Enter new task description:")? else {
            return writeln!(self.output, "New description cannot be empty.");
        };
        match self.store.rename(id, description.as_str()) {
            Ok(()) => writeln!(self.output, "Task {} updated to: \"{}\".", id, description),
            Err(e) => self.report(e),
        }
    }

    fn search(&mut self) -> io::Result<()> {
        let Some(query) = self.prompt_text("Enter search query:")? else {
            return writeln!(self.output, "Search query cannot be empty.");
        };
        self.clear_screen()?;

        let results = self.store.search(&query);
        if results.is_empty() {
            return writeln!(self.output, "No tasks found matching \"{}\".", query);
        }
        writeln!(self.output)?;
        writeln!(self.output, "Search Results:")?;
        write_tasks(&mut self.output, results.into_iter())?;
        writeln!(self.output)
    }

    /// 操作失败只打印提示，不中断循环
    fn report(&mut self, err: TaskError) -> io::Result<()> {
        if err.is_not_found() || matches!(err, TaskError::InvalidData(_)) {
            writeln!(self.output, "{}", err)
        } else {
            tracing::error!(error = %err, "failed to persist tasks");
            writeln!(self.output, "Failed to save tasks: {}", err)
        }
    }

    /// 打印提示并读一行；输入结束返回 `None`
    fn prompt(&mut self, message: &str) -> io::Result<Option<String>> {
        write!(self.output, "{} ", message)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            writeln!(self.output)?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// 读取非空文本，原样返回；只含空白视为空输入，返回 `None`
    fn prompt_text(&mut self, message: &str) -> io::Result<Option<String>> {
        Ok(self.prompt(message)?.filter(|s| !s.trim().is_empty()))
    }

    /// 读取任务 ID，非法时打印提示并返回 `None`
    fn prompt_id(&mut self, message: &str) -> io::Result<Option<u32>> {
        let id = self.prompt(message)?.as_deref().and_then(parse_id);
        if id.is_none() {
            writeln!(self.output, "Invalid task ID.")?;
        }
        Ok(id)
    }

    fn clear_screen(&mut self) -> io::Result<()> {
        if self.config.clear_screen {
            execute!(self.output, Clear(ClearType::All), MoveTo(0, 0))?;
        }
        Ok(())
    }

    fn pause(&self) {
        if self.config.pause_ms > 0 {
            thread::sleep(Duration::from_millis(self.config.pause_ms));
        }
    }
}

fn write_tasks<'a>(out: &mut impl Write, tasks: impl Iterator<Item = &'a Task>) -> io::Result<()> {
    for task in tasks {
        writeln!(out, "{}", task)?;
    }
    Ok(())
}
