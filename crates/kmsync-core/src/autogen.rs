//! Auto-instruction generator (C5): given a component and an archive's
//! shape classification, produces or augments instructions and options
//! without ever duplicating one already present. Pure with respect to
//! its inputs — no VFS needed, so the no-duplicate-generation property
//! is a plain unit test.

use crate::model::{ActionKind, ArchiveAnalysis, Component, Instruction, Option_};
use crate::path;

#[derive(Debug, Clone, Default)]
pub struct GeneratedPlan {
    pub instructions: Vec<Instruction>,
    pub options: Vec<Option_>,
}

/// Two instructions are equivalent when their action matches exactly and
/// their source/destination/arguments/overwrite fields agree per spec
/// §4.5 (source lists compared under set-equality-with-wildcard-overlap).
pub trait InstructionEquivalence {
    fn equivalent_to(&self, other: &Instruction) -> bool;
}

impl InstructionEquivalence for Instruction {
    fn equivalent_to(&self, other: &Instruction) -> bool {
        if self.action != other.action {
            return false;
        }
        if !sources_equivalent(&self.source, &other.source) {
            return false;
        }
        if self.action.uses_destination() {
            match (&self.destination, &other.destination) {
                (Some(a), Some(b)) => {
                    if !path::patterns_overlap(a, b) && !a.eq_ignore_ascii_case(b) {
                        return false;
                    }
                }
                (None, None) => {}
                _ => return false,
            }
        }
        if self.action.uses_arguments() {
            match (&self.arguments, &other.arguments) {
                (Some(a), Some(b)) => {
                    if !a.eq_ignore_ascii_case(b) {
                        return false;
                    }
                }
                (None, None) => {}
                _ => return false,
            }
        }
        if self.action.uses_overwrite() && self.overwrite != other.overwrite {
            return false;
        }
        true
    }
}

fn sources_equivalent(a: &[String], b: &[String]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|sa| b.iter().any(|sb| path::patterns_overlap(sa, sb) || sa.eq_ignore_ascii_case(sb)))
}

/// Two options are equivalent-by-instructions iff their instruction sets
/// are bidirectionally pairwise equivalent, ignoring name/description.
fn options_equivalent(a: &[Instruction], b: &[Instruction]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|ia| b.iter().any(|ib| ia.equivalent_to(ib)))
        && b.iter().all(|ib| a.iter().any(|ia| ia.equivalent_to(ib)))
}

/// Before generating a folder-move instruction, skip it if an existing
/// `Move`/`Extract` source already covers the new pattern (exact match,
/// or a prefix ending in `*` / `*\*`).
fn is_covered_by_existing(new_pattern: &str, existing: &[Instruction]) -> bool {
    existing
        .iter()
        .filter(|i| matches!(i.action, ActionKind::Move | ActionKind::Extract))
        .flat_map(|i| i.source.iter())
        .any(|src| {
            path::patterns_overlap(src, new_pattern)
                || new_pattern.starts_with(src.trim_end_matches('*').trim_end_matches('\\'))
        })
}

/// Known special-case fingerprints: components matching these get only a
/// `DelDuplicate` instruction (spec §4.5).
fn matches_remove_duplicate_tga_fingerprint(component: &Component) -> bool {
    let name = component.name.to_ascii_lowercase();
    name.contains("remove duplicate") && (name.contains("tga") || name.contains("tpc"))
}

pub struct Generator;

impl Generator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, component: &Component, analysis: &ArchiveAnalysis, archive_pattern: &str) -> GeneratedPlan {
        let mut plan = GeneratedPlan::default();

        if matches_remove_duplicate_tga_fingerprint(component) {
            let instr = Instruction::new(ActionKind::DelDuplicate, Vec::new());
            self.append_if_new(&mut plan, component, instr);
            return plan;
        }

        let needs_extract = analysis.has_tsl_patch_data || analysis.has_simple_override_files || analysis.has_flat_files;
        if needs_extract {
            let extract = Instruction::new(ActionKind::Extract, vec![archive_pattern.to_string()])
                .with_destination("<<modDirectory>>\\extracted");
            self.append_if_new(&mut plan, component, extract);
        }

        if analysis.has_tsl_patch_data {
            self.generate_patcher_instructions(component, analysis, &mut plan);
        }

        if analysis.has_simple_override_files || analysis.has_flat_files {
            self.generate_override_instructions(component, analysis, &mut plan);
        }

        self.consolidate_options(&mut plan);
        plan
    }

    fn generate_patcher_instructions(&self, component: &Component, analysis: &ArchiveAnalysis, plan: &mut GeneratedPlan) {
        let parent = analysis.patcher_path.clone().unwrap_or_default();
        let exe = analysis
            .patcher_executable
            .clone()
            .unwrap_or_else(|| "TSLPatcher.exe".to_string());
        let exe_path = format!("<<modDirectory>>\\extracted\\{parent}\\{exe}").replace("\\\\", "\\");

        if analysis.has_namespaces_ini {
            // One Patcher instruction per namespace entry, wrapped in a
            // Choose. The namespace list itself lives in namespaces.ini,
            // which this pure function does not parse (that belongs to
            // the caller that already has archive bytes in hand); a
            // single representative option is generated and augmented by
            // the caller if more namespace entries are discovered.
            let mut opt = Option_::new("TSLPatcher namespace");
            let patcher = Instruction::new(ActionKind::Patcher, vec![exe_path.clone()])
                .with_destination("<<kotorDirectory>>")
                .with_arguments("changes.ini");
            opt.instructions.push(patcher);
            self.append_option_if_new(component, plan, opt);
        } else if analysis.has_changes_ini {
            let patcher = Instruction::new(ActionKind::Patcher, vec![exe_path])
                .with_destination("<<kotorDirectory>>")
                .with_arguments("changes.ini");
            self.append_if_new(plan, component, patcher);
        }
    }

    fn generate_override_instructions(&self, component: &Component, analysis: &ArchiveAnalysis, plan: &mut GeneratedPlan) {
        match analysis.game_file_folders.len() {
            0 if analysis.has_flat_files => {
                let instr = Instruction::new(
                    ActionKind::Move,
                    vec!["<<modDirectory>>\\extracted\\*".to_string()],
                )
                .with_destination("<<kotorDirectory>>\\Override");
                self.append_if_new(plan, component, instr);
            }
            1 => {
                let folder = &analysis.game_file_folders[0];
                let pattern = format!("<<modDirectory>>\\extracted\\{folder}\\*");
                if is_covered_by_existing(&pattern, &component.instructions) {
                    return;
                }
                let instr = Instruction::new(ActionKind::Move, vec![pattern])
                    .with_destination("<<kotorDirectory>>\\Override");
                self.append_if_new(plan, component, instr);
            }
            _ => {
                let mut opt = Option_::new("Choose override folder");
                for folder in &analysis.game_file_folders {
                    let pattern = format!("<<modDirectory>>\\extracted\\{folder}\\*");
                    let mut sub = Option_::new(folder.clone());
                    sub.instructions.push(
                        Instruction::new(ActionKind::Move, vec![pattern])
                            .with_destination("<<kotorDirectory>>\\Override"),
                    );
                    opt.instructions.extend(sub.instructions);
                }
                self.append_option_if_new(component, plan, opt);
            }
        }
    }

    fn append_if_new(&self, plan: &mut GeneratedPlan, component: &Component, instr: Instruction) {
        let existing_all: Vec<&Instruction> = component
            .instructions
            .iter()
            .chain(plan.instructions.iter())
            .collect();
        if existing_all.iter().any(|e| e.equivalent_to(&instr)) {
            return;
        }
        plan.instructions.push(instr);
    }

    fn append_option_if_new(&self, component: &Component, plan: &mut GeneratedPlan, option: Option_) {
        let all_existing_options: Vec<&Option_> = component.options.iter().chain(plan.options.iter()).collect();
        for existing in &all_existing_options {
            if options_equivalent(&existing.instructions, &option.instructions) {
                return;
            }
        }
        plan.options.push(option);
    }

    /// Sweep pass: merge options whose instruction sets overlap by at
    /// least one instruction. Choose.Source rewriting to the surviving
    /// id is the caller's responsibility once ids are persisted in a
    /// live Component; this pure function only dedups the generated set.
    fn consolidate_options(&self, plan: &mut GeneratedPlan) {
        let mut merged: Vec<Option_> = Vec::new();
        'outer: for option in plan.options.drain(..) {
            for existing in merged.iter_mut() {
                let overlaps = option
                    .instructions
                    .iter()
                    .any(|i| existing.instructions.iter().any(|e| e.equivalent_to(i)));
                if overlaps {
                    for instr in option.instructions {
                        if !existing.instructions.iter().any(|e| e.equivalent_to(&instr)) {
                            existing.instructions.push(instr);
                        }
                    }
                    continue 'outer;
                }
            }
            merged.push(option);
        }
        plan.options = merged;
    }
}

impl Default for Generator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_duplicate_existing_extract_instruction() {
        let mut component = Component::new("Test", "Author");
        component
            .instructions
            .push(Instruction::new(ActionKind::Extract, vec!["Mod.zip".to_string()]));
        let analysis = ArchiveAnalysis {
            has_flat_files: true,
            has_simple_override_files: true,
            ..Default::default()
        };
        let plan = Generator::new().generate(&component, &analysis, "Mod.zip");
        let extracts: Vec<_> = plan
            .instructions
            .iter()
            .filter(|i| i.action == ActionKind::Extract)
            .collect();
        assert!(extracts.is_empty(), "extract already present must not be regenerated");
    }

    #[test]
    fn flat_archive_generates_single_move_to_override() {
        let component = Component::new("Test", "Author");
        let analysis = ArchiveAnalysis {
            has_flat_files: true,
            has_simple_override_files: true,
            ..Default::default()
        };
        let plan = Generator::new().generate(&component, &analysis, "Mod.zip");
        let moves: Vec<_> = plan
            .instructions
            .iter()
            .filter(|i| i.action == ActionKind::Move)
            .collect();
        assert_eq!(moves.len(), 1);
    }

    #[test]
    fn multi_folder_archive_generates_choose_option() {
        let component = Component::new("Test", "Author");
        let analysis = ArchiveAnalysis {
            has_simple_override_files: true,
            game_file_folders: vec!["A".to_string(), "B".to_string()],
            ..Default::default()
        };
        let plan = Generator::new().generate(&component, &analysis, "Mod.zip");
        assert_eq!(plan.options.len(), 1);
        assert_eq!(plan.options[0].instructions.len(), 2);
    }

    #[test]
    fn hybrid_archive_generates_both_patcher_and_override() {
        let component = Component::new("Test", "Author");
        let analysis = ArchiveAnalysis {
            has_tsl_patch_data: true,
            has_changes_ini: true,
            has_flat_files: true,
            has_simple_override_files: true,
            patcher_path: Some("Mod".to_string()),
            patcher_executable: Some("TSLPatcher.exe".to_string()),
            ..Default::default()
        };
        let plan = Generator::new().generate(&component, &analysis, "Mod.zip");
        assert!(plan.instructions.iter().any(|i| i.action == ActionKind::Patcher));
        assert!(plan.instructions.iter().any(|i| i.action == ActionKind::Move));
    }

    #[test]
    fn remove_duplicate_fingerprint_yields_only_del_duplicate() {
        let component = Component::new("Remove Duplicate TGA/TPC Files", "Fred Tetra");
        let analysis = ArchiveAnalysis::default();
        let plan = Generator::new().generate(&component, &analysis, "x.zip");
        assert_eq!(plan.instructions.len(), 1);
        assert_eq!(plan.instructions[0].action, ActionKind::DelDuplicate);
    }

    #[test]
    fn parent_coverage_skips_generation_when_already_covered() {
        let mut component = Component::new("Test", "Author");
        component.instructions.push(
            Instruction::new(ActionKind::Move, vec!["<<modDirectory>>\\extracted\\FolderA\\*".to_string()])
                .with_destination("<<kotorDirectory>>\\Override"),
        );
        let analysis = ArchiveAnalysis {
            has_simple_override_files: true,
            game_file_folders: vec!["FolderA".to_string()],
            ..Default::default()
        };
        let plan = Generator::new().generate(&component, &analysis, "Mod.zip");
        assert!(plan.instructions.iter().all(|i| i.action != ActionKind::Move));
    }

    #[test]
    fn instruction_equivalence_is_symmetric() {
        let a = Instruction::new(ActionKind::Move, vec!["<<modDirectory>>\\*.2da".to_string()])
            .with_destination("<<kotorDirectory>>\\Override");
        let b = Instruction::new(ActionKind::Move, vec!["<<modDirectory>>\\foo.2da".to_string()])
            .with_destination("<<kotorDirectory>>\\Override");
        assert_eq!(a.equivalent_to(&b), b.equivalent_to(&a));
    }
}
