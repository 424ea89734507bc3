//! Instruction executor (C4): single-threaded, strictly sequential over
//! one component's instruction list. Generic over `&mut dyn PlannerFs`
//! so it runs unmodified against the in-memory VFS or a real disk.

use crate::diagnostics::ExecSignal;
use crate::fs::PlannerFs;
use crate::model::{ActionKind, Component, Instruction, IssueCategory, Option_, Severity, ValidationIssue};
use crate::path;

/// Run-wide placeholder roots, resolved once at the executor boundary
/// before paths reach the VFS.
pub struct ExecContext {
    pub mod_directory: String,
    pub kotor_directory: String,
    pub now_millis: u64,
}

impl ExecContext {
    pub fn new(mod_directory: impl Into<String>, kotor_directory: impl Into<String>, now_millis: u64) -> Self {
        Self {
            mod_directory: mod_directory.into(),
            kotor_directory: kotor_directory.into(),
            now_millis,
        }
    }

    pub(crate) fn resolve(&self, value: &str) -> String {
        path::substitute_placeholders(value, &self.mod_directory, &self.kotor_directory)
    }
}

pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    /// Executes every instruction of `component`, including the
    /// instructions of any selected `Choose` options, in order.
    pub fn run(
        &mut self,
        instructions: &[Instruction],
        options: &[Option_],
        fs: &mut dyn PlannerFs,
        ctx: &ExecContext,
    ) -> Result<(), ExecSignal> {
        for (index, instr) in instructions.iter().enumerate() {
            self.exec_one(instr, index, options, fs, ctx)?;
        }
        self.check_termination(fs)
    }

    pub fn run_component(
        &mut self,
        component: &Component,
        fs: &mut dyn PlannerFs,
        ctx: &ExecContext,
    ) -> Result<(), ExecSignal> {
        self.run(&component.instructions, &component.options, fs, ctx)
    }

    fn check_termination(&self, fs: &dyn PlannerFs) -> Result<(), ExecSignal> {
        for (index, issue) in fs.issues().iter().enumerate() {
            if issue.severity.is_at_least_error() {
                return Err(ExecSignal::InstructionFailed {
                    index: issue.instruction_index.unwrap_or(index),
                    id: issue.instruction_id.unwrap_or_default(),
                    message: issue.message.clone(),
                });
            }
        }
        Ok(())
    }

    fn exec_one(
        &mut self,
        instr: &Instruction,
        index: usize,
        options: &[Option_],
        fs: &mut dyn PlannerFs,
        ctx: &ExecContext,
    ) -> Result<(), ExecSignal> {
        match instr.action {
            ActionKind::Extract => self.exec_extract(instr, fs, ctx),
            ActionKind::Move => self.exec_move(instr, index, fs, ctx),
            ActionKind::Copy => self.exec_copy(instr, index, fs, ctx),
            ActionKind::Delete => self.exec_delete(instr, fs, ctx),
            ActionKind::Rename => self.exec_rename(instr, index, fs, ctx),
            ActionKind::Patcher => self.exec_patcher(instr, index, fs, ctx),
            ActionKind::Execute => self.exec_execute(instr, index, fs, ctx),
            ActionKind::Choose => self.exec_choose(instr, options, fs, ctx),
            ActionKind::DelDuplicate => Ok(()),
        }
    }

    fn resolved_sources(&self, instr: &Instruction, ctx: &ExecContext) -> Vec<String> {
        instr.source.iter().map(|s| ctx.resolve(s)).collect()
    }

    fn exec_extract(
        &mut self,
        instr: &Instruction,
        fs: &mut dyn PlannerFs,
        ctx: &ExecContext,
    ) -> Result<(), ExecSignal> {
        let patterns = self.resolved_sources(instr, ctx);
        let matches = match fs.enumerate(&patterns, true) {
            Ok(m) => m,
            Err(signal) => {
                if instr.optional {
                    return Ok(());
                }
                return Err(signal);
            }
        };
        let dst = instr
            .destination
            .as_deref()
            .map(|d| ctx.resolve(d))
            .unwrap_or_else(|| format!("{}\\extracted", ctx.mod_directory));
        for archive in matches {
            fs.extract_archive(&archive, &dst);
        }
        Ok(())
    }

    fn exec_move(
        &mut self,
        instr: &Instruction,
        index: usize,
        fs: &mut dyn PlannerFs,
        ctx: &ExecContext,
    ) -> Result<(), ExecSignal> {
        let patterns = self.resolved_sources(instr, ctx);
        let matches = match fs.enumerate(&patterns, true) {
            Ok(m) => m,
            Err(signal) => {
                if instr.optional {
                    return Ok(());
                }
                return Err(signal);
            }
        };
        if matches.is_empty() {
            if instr.optional {
                return Ok(());
            }
            let now = ctx.now_millis;
            fs.log_issue(
                ValidationIssue::new(
                    Severity::Error,
                    IssueCategory::MoveFile,
                    "no source files matched for a required move".to_string(),
                    now,
                )
                .with_instruction(instr.id, index),
            );
            return Ok(());
        }
        let dst_base = instr
            .destination
            .as_deref()
            .map(|d| ctx.resolve(d))
            .unwrap_or_else(|| ctx.kotor_directory.clone());
        let multi = matches.len() > 1;
        for m in matches {
            let dst = if multi {
                let name = m.rsplit('\\').next().unwrap_or(&m);
                format!("{dst_base}\\{name}")
            } else {
                dst_base.clone()
            };
            fs.move_file(&m, &dst, instr.overwrite);
        }
        Ok(())
    }

    fn exec_copy(
        &mut self,
        instr: &Instruction,
        index: usize,
        fs: &mut dyn PlannerFs,
        ctx: &ExecContext,
    ) -> Result<(), ExecSignal> {
        let patterns = self.resolved_sources(instr, ctx);
        let matches = match fs.enumerate(&patterns, true) {
            Ok(m) => m,
            Err(signal) => {
                if instr.optional {
                    return Ok(());
                }
                return Err(signal);
            }
        };
        if matches.is_empty() {
            if instr.optional {
                return Ok(());
            }
            let now = ctx.now_millis;
            fs.log_issue(
                ValidationIssue::new(
                    Severity::Error,
                    IssueCategory::CopyFile,
                    "no source files matched for a required copy".to_string(),
                    now,
                )
                .with_instruction(instr.id, index),
            );
            return Ok(());
        }
        let dst_base = instr
            .destination
            .as_deref()
            .map(|d| ctx.resolve(d))
            .unwrap_or_else(|| ctx.kotor_directory.clone());
        let multi = matches.len() > 1;
        for m in matches {
            let dst = if multi {
                let name = m.rsplit('\\').next().unwrap_or(&m);
                format!("{dst_base}\\{name}")
            } else {
                dst_base.clone()
            };
            fs.copy_file(&m, &dst, instr.overwrite);
        }
        Ok(())
    }

    fn exec_delete(
        &mut self,
        instr: &Instruction,
        fs: &mut dyn PlannerFs,
        ctx: &ExecContext,
    ) -> Result<(), ExecSignal> {
        let patterns = self.resolved_sources(instr, ctx);
        let matches = match fs.enumerate(&patterns, true) {
            Ok(m) => m,
            Err(_signal) => {
                // Missing files on Delete are warnings, never a hard
                // precondition (spec §4.4); resolve literal sources by
                // hand instead of propagating the signal.
                patterns
            }
        };
        for m in matches {
            fs.delete_file(&m);
        }
        Ok(())
    }

    fn exec_rename(
        &mut self,
        instr: &Instruction,
        index: usize,
        fs: &mut dyn PlannerFs,
        ctx: &ExecContext,
    ) -> Result<(), ExecSignal> {
        let patterns = self.resolved_sources(instr, ctx);
        let Some(src) = patterns.first() else {
            return Ok(());
        };
        let matches = fs.enumerate(std::slice::from_ref(src), true);
        let resolved_src = match matches {
            Ok(m) if !m.is_empty() => m[0].clone(),
            _ => {
                let now = ctx.now_millis;
                fs.log_issue(
                    ValidationIssue::new(
                        Severity::Error,
                        IssueCategory::RenameFile,
                        format!("source for rename does not exist: {src}"),
                        now,
                    )
                    .with_instruction(instr.id, index),
                );
                return Ok(());
            }
        };
        let Some(new_name) = instr.arguments.as_deref() else {
            return Ok(());
        };
        fs.rename_file(&resolved_src, new_name);
        Ok(())
    }

    fn exec_patcher(
        &mut self,
        instr: &Instruction,
        index: usize,
        fs: &mut dyn PlannerFs,
        ctx: &ExecContext,
    ) -> Result<(), ExecSignal> {
        let Some(src) = instr.source.first() else {
            return Ok(());
        };
        let resolved = ctx.resolve(src);
        if !fs.file_exists(&resolved) {
            let now = ctx.now_millis;
            fs.log_issue(
                ValidationIssue::new(
                    Severity::Error,
                    IssueCategory::Patcher,
                    format!("patcher executable not found: {resolved}"),
                    now,
                )
                .with_instruction(instr.id, index),
            );
            return Ok(());
        }
        let parent = resolved.rsplit_once('\\').map(|(p, _)| p).unwrap_or("");
        let sibling = format!("{parent}\\tslpatchdata");
        if !fs.dir_exists(&sibling) {
            let now = ctx.now_millis;
            fs.log_issue(
                ValidationIssue::new(
                    Severity::Error,
                    IssueCategory::Patcher,
                    format!("tslpatchdata directory missing beside patcher: {sibling}"),
                    now,
                )
                .with_instruction(instr.id, index),
            );
        }
        Ok(())
    }

    fn exec_execute(
        &mut self,
        instr: &Instruction,
        index: usize,
        fs: &mut dyn PlannerFs,
        ctx: &ExecContext,
    ) -> Result<(), ExecSignal> {
        let Some(target) = instr.source.first() else {
            return Ok(());
        };
        let resolved = ctx.resolve(target);
        if !fs.file_exists(&resolved) {
            let now = ctx.now_millis;
            fs.log_issue(
                ValidationIssue::new(
                    Severity::Error,
                    IssueCategory::Execute,
                    format!("executable target not found: {resolved}"),
                    now,
                )
                .with_instruction(instr.id, index),
            );
        }
        Ok(())
    }

    fn exec_choose(
        &mut self,
        instr: &Instruction,
        options: &[Option_],
        fs: &mut dyn PlannerFs,
        ctx: &ExecContext,
    ) -> Result<(), ExecSignal> {
        for option_id in instr.choose_option_ids() {
            if let Some(opt) = options.iter().find(|o| o.id == option_id) {
                if opt.selected {
                    self.run(&opt.instructions, options, fs, ctx)?;
                }
            }
        }
        Ok(())
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Component;
    use crate::vfs::Vfs;

    fn ctx() -> ExecContext {
        ExecContext::new("M", "K", 0)
    }

    #[test]
    fn move_succeeds_for_single_match() {
        let mut vfs = Vfs::new(0);
        vfs.add_file("M\\foo.2da");
        let instr = Instruction::new(ActionKind::Move, vec!["<<modDirectory>>\\foo.2da".into()])
            .with_destination("<<kotorDirectory>>\\Override\\foo.2da");
        let mut exec = Executor::new();
        let c = ctx();
        exec.run(&[instr], &[], &mut vfs, &c).unwrap();
        assert!(vfs.file_exists("K\\Override\\foo.2da"));
    }

    #[test]
    fn move_with_empty_match_and_not_optional_fails_termination() {
        let mut vfs = Vfs::new(0);
        let instr = Instruction::new(ActionKind::Move, vec!["M\\missing.2da".into()]);
        let mut exec = Executor::new();
        let c = ctx();
        let result = exec.run(&[instr], &[], &mut vfs, &c);
        assert!(result.is_err());
    }

    #[test]
    fn optional_move_with_no_matches_succeeds() {
        let mut vfs = Vfs::new(0);
        let mut instr = Instruction::new(ActionKind::Move, vec!["M\\missing.2da".into()]);
        instr.optional = true;
        let mut exec = Executor::new();
        let c = ctx();
        assert!(exec.run(&[instr], &[], &mut vfs, &c).is_ok());
    }

    #[test]
    fn delete_missing_does_not_fail_run() {
        let mut vfs = Vfs::new(0);
        let instr = Instruction::new(ActionKind::Delete, vec!["M\\missing.2da".into()]);
        let mut exec = Executor::new();
        let c = ctx();
        assert!(exec.run(&[instr], &[], &mut vfs, &c).is_ok());
    }

    #[test]
    fn choose_runs_only_selected_option_instructions() {
        let mut vfs = Vfs::new(0);
        vfs.add_file("M\\a.2da");
        vfs.add_file("M\\b.2da");
        let mut opt_a = Option_::new("A");
        opt_a.selected = true;
        opt_a
            .instructions
            .push(Instruction::new(ActionKind::Move, vec!["<<modDirectory>>\\a.2da".into()])
                .with_destination("<<kotorDirectory>>\\Override\\a.2da"));
        let mut opt_b = Option_::new("B");
        opt_b.selected = false;
        opt_b
            .instructions
            .push(Instruction::new(ActionKind::Move, vec!["<<modDirectory>>\\b.2da".into()])
                .with_destination("<<kotorDirectory>>\\Override\\b.2da"));

        let choose = Instruction::new(
            ActionKind::Choose,
            vec![opt_a.id.to_string(), opt_b.id.to_string()],
        );
        let mut exec = Executor::new();
        let c = ctx();
        let options = vec![opt_a, opt_b];
        exec.run(&[choose], &options, &mut vfs, &c).unwrap();
        assert!(vfs.file_exists("K\\Override\\a.2da"));
        assert!(!vfs.file_exists("K\\Override\\b.2da"));
    }

    #[test]
    fn patcher_requires_sibling_tslpatchdata() {
        let mut vfs = Vfs::new(0);
        vfs.add_file("M\\Patch\\TSLPatcher.exe");
        let instr = Instruction::new(ActionKind::Patcher, vec!["<<modDirectory>>\\Patch\\TSLPatcher.exe".into()])
            .with_destination("<<kotorDirectory>>")
            .with_arguments("changes.ini");
        let mut exec = Executor::new();
        let c = ctx();
        exec.run(&[instr], &[], &mut vfs, &c).unwrap_err();
    }

    #[test]
    fn component_runner_delegates_to_run() {
        let mut vfs = Vfs::new(0);
        let component = Component::new("Empty", "Author");
        let mut exec = Executor::new();
        let c = ctx();
        assert!(exec.run_component(&component, &mut vfs, &c).is_ok());
    }
}
