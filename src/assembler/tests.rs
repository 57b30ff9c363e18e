// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use super::{Assembler, AssemblerOptions, AssemblerState, BSS_SECTION, CODE_SECTION, DATA_SECTION};
use crate::core::assembler::error::{AsmError, AsmRunError, AsmRunReport, Severity};
use crate::core::cpu::{CpuModule, Pass};
use crate::core::expr::Expr;
use crate::core::source::Line;
use proptest::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Minimal target: NOP, INST (emits the macro instance), LDA #, JMP addr.
#[derive(Default)]
struct ToyCpu {
    big_endian: bool,
    skip_intermediate: bool,
    passes: Mutex<Vec<Pass>>,
}

impl CpuModule for ToyCpu {
    fn name(&self) -> &str {
        "toy"
    }

    fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    fn is_supported_pass(&self, pass: Pass) -> bool {
        !(self.skip_intermediate && pass == Pass::Intermediate)
    }

    fn is_mnemonic(&self, name: &str) -> bool {
        matches!(name, "NOP" | "INST" | "LDA" | "JMP")
    }

    fn compile(&self, mnemonic: &str, asm: &mut AssemblerState) -> bool {
        match mnemonic {
            "NOP" => asm.add_byte(0),
            "INST" => {
                let instance = asm.macro_instance().unwrap_or(0);
                asm.add_byte(i64::from(instance));
            }
            "LDA" => {
                asm.add_byte(0xA9);
                let value = asm.parse_expr();
                asm.add_byte(value);
            }
            "JMP" => {
                asm.add_byte(0x4C);
                let value = asm.parse_expr();
                asm.add_word(value);
            }
            _ => return false,
        }
        asm.expect_end();
        true
    }

    fn start_pass(&self, asm: &mut AssemblerState) {
        if let Ok(mut passes) = self.passes.lock() {
            passes.push(asm.pass());
        }
    }
}

fn create_temp_dir(label: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("target")
        .join(format!("test-{label}-{}-{nanos}", process::id()));
    fs::create_dir_all(&dir).expect("Create temp dir");
    dir
}

fn write_file(path: &Path, contents: &str) {
    fs::write(path, contents).expect("Write test file");
}

struct Run {
    dir: PathBuf,
    assembler: Assembler,
    result: Result<AsmRunReport, AsmRunError>,
}

impl Run {
    fn code(&self) -> Vec<u8> {
        self.section(CODE_SECTION)
    }

    fn section(&self, name: &str) -> Vec<u8> {
        self.assembler
            .module()
            .section_named(name)
            .map(|section| section.bytes())
            .unwrap_or_default()
    }

    fn errors(&self) -> Vec<AsmError> {
        match &self.result {
            Ok(report) => report
                .diagnostics()
                .iter()
                .filter(|d| d.severity() == Severity::Error)
                .map(|d| d.error().clone())
                .collect(),
            Err(err) => err
                .diagnostics()
                .iter()
                .filter(|d| d.severity() == Severity::Error)
                .map(|d| d.error().clone())
                .collect(),
        }
    }

    fn assert_ok(&self) {
        if let Err(err) = &self.result {
            let messages: Vec<String> = err.diagnostics().iter().map(|d| d.format()).collect();
            panic!("assembly failed: {err}: {messages:?}");
        }
    }

    fn read(&self, name: &str) -> String {
        fs::read_to_string(self.dir.join(name)).expect("Read output file")
    }
}

fn assemble_with(
    label: &str,
    cpu: Arc<dyn CpuModule>,
    options: AssemblerOptions,
    source: &str,
    extra: &[(&str, &str)],
) -> Run {
    let dir = create_temp_dir(label);
    for (name, contents) in extra {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Create include dir");
        }
        write_file(&path, contents);
    }
    let path = dir.join("prog.asm");
    write_file(&path, source);
    let mut assembler = Assembler::new(cpu, options);
    let result = assembler.assemble(&path);
    Run {
        dir,
        assembler,
        result,
    }
}

fn assemble(label: &str, source: &str) -> Run {
    assemble_with(
        label,
        Arc::new(ToyCpu::default()),
        AssemblerOptions::default(),
        source,
        &[],
    )
}

fn assemble_files(label: &str, source: &str, extra: &[(&str, &str)]) -> Run {
    assemble_with(
        label,
        Arc::new(ToyCpu::default()),
        AssemblerOptions::default(),
        source,
        extra,
    )
}

#[test]
fn equate_feeds_byte_expression() {
    let run = assemble("equ", "COUNT .EQU 5\n .BYTE COUNT+1\n");
    run.assert_ok();
    assert_eq!(run.code(), vec![0x06]);
    assert_eq!(run.assembler.symbols().lookup("COUNT"), Some(&Expr::Value(5)));
}

#[test]
fn second_equate_is_a_redefinition() {
    let run = assemble("equ-dup", "COUNT .EQU 5\n .BYTE COUNT+1\nCOUNT .EQU 6\n");
    let err = run.result.as_ref().expect_err("redefinition must fail");
    assert!(err.counts().errors > 0);
    assert_eq!(err.error(), &AsmError::Failed(err.counts().errors));
    assert!(run
        .errors()
        .contains(&AsmError::LabelRedefined("COUNT".to_string())));
}

#[test]
fn equals_sign_aliases_equate() {
    let run = assemble("equals", "K = 7\n .BYTE K\n");
    run.assert_ok();
    assert_eq!(run.code(), vec![7]);
}

#[test]
fn byte_strings_expand_to_characters() {
    let run = assemble("byte-str", " .BYTE \"AB\",3\n .BYTE 'C'+1\n");
    run.assert_ok();
    assert_eq!(run.code(), vec![0x41, 0x42, 0x03, 0x44]);
}

#[test]
fn word_and_long_follow_module_byte_order() {
    let source = " .WORD $1234\n .LONG $11223344\n";
    let little = assemble("word-le", source);
    little.assert_ok();
    assert_eq!(
        little.code(),
        vec![0x34, 0x12, 0x44, 0x33, 0x22, 0x11]
    );

    let cpu = Arc::new(ToyCpu {
        big_endian: true,
        ..ToyCpu::default()
    });
    let big = assemble_with("word-be", cpu, AssemblerOptions::default(), source, &[]);
    big.assert_ok();
    assert_eq!(big.code(), vec![0x12, 0x34, 0x11, 0x22, 0x33, 0x44]);
}

#[test]
fn dbyte_is_high_byte_first() {
    let run = assemble("dbyte", " .DBYTE $1234\n");
    run.assert_ok();
    assert_eq!(run.code(), vec![0x12, 0x34]);
}

#[test]
fn space_emits_zero_fill() {
    let run = assemble("space", " .SPACE 3\n .BYTE 1\n");
    run.assert_ok();
    assert_eq!(run.code(), vec![0, 0, 0, 1]);
}

#[test]
fn forward_references_settle_by_final_pass() {
    let run = assemble(
        "forward",
        " .ORG $1000\n JMP TARGET\n NOP\nTARGET NOP\n",
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![0x4C, 0x04, 0x10, 0x00, 0x00]);
    assert_eq!(
        run.assembler.symbols().lookup("TARGET"),
        Some(&Expr::Value(0x1004))
    );
}

#[test]
fn forward_divisors_settle_by_final_pass() {
    let run = assemble("forward-div", " .BYTE 10/LATER\nLATER .EQU 2\n");
    run.assert_ok();
    assert_eq!(run.code(), vec![5]);

    let run = assemble(
        "forward-mod",
        " .BYTE 8%(END2-START2)\nSTART2 NOP\n NOP\n NOP\nEND2 NOP\n",
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![2, 0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn zero_divisor_is_reported_on_final_pass() {
    let run = assemble("div-zero", " .BYTE 4/0\n");
    let err = run.result.as_ref().expect_err("division by zero must fail");
    let diag = &err.diagnostics()[0];
    assert_eq!(diag.error(), &AsmError::DivisionByZero);
    assert_eq!(diag.pass(), Some(Pass::Final));
}

#[test]
fn relative_operands_become_relocations() {
    let run = assemble("reloc", "START NOP\n JMP START\n");
    run.assert_ok();
    let section = run
        .assembler
        .module()
        .section_named(CODE_SECTION)
        .expect("code section");
    let relocs: Vec<_> = section.areas().iter().flat_map(|a| a.relocs.iter()).collect();
    assert_eq!(relocs.len(), 1);
    assert_eq!(relocs[0].offset, 2);
    assert!(relocs[0].expr.is_relative());
    assert_eq!(section.bytes(), vec![0x00, 0x4C, 0x00, 0x00]);
}

#[test]
fn undefined_symbol_is_reported_on_final_pass_only() {
    let run = assemble("undefined", " .BYTE NOWHERE\n");
    let err = run.result.as_ref().expect_err("undefined symbol must fail");
    let diag = &err.diagnostics()[0];
    assert_eq!(diag.error(), &AsmError::UndefinedSymbol("NOWHERE".to_string()));
    assert_eq!(diag.pass(), Some(Pass::Final));
    assert_eq!(diag.line(), 1);
}

#[test]
fn local_labels_scope_to_preceding_global() {
    let run = assemble(
        "locals",
        " .ORG $100\nSTART NOP\n.L1 NOP\n LDA .L1\nNEXT NOP\n.L1 NOP\n",
    );
    run.assert_ok();
    let symbols = run.assembler.symbols();
    assert_eq!(symbols.lookup("START.L1"), Some(&Expr::Value(0x101)));
    assert_eq!(symbols.lookup("NEXT.L1"), Some(&Expr::Value(0x105)));
    assert_eq!(run.code()[3], 0x01);
}

#[test]
fn local_label_without_global_errors() {
    let run = assemble("local-none", ".L1 NOP\n");
    assert!(run.result.is_err());
    assert!(run.errors().contains(&AsmError::NoGlobalLabel));
}

#[test]
fn conditional_branches_select_code() {
    let run = assemble(
        "cond",
        " .IF 1\n .BYTE 1\n .ELSE\n .BYTE 2\n .ENDIF\n \
         .IF 0\n .BYTE 3\nSKIPPED .EQU 9\n .ELSE\n .BYTE 4\n .ENDIF\n",
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![1, 4]);
    assert!(run.assembler.symbols().lookup("SKIPPED").is_none());
}

#[test]
fn nested_conditionals_inside_false_branch_stay_inactive() {
    let run = assemble(
        "cond-nest",
        " .IF 0\n .IF 1\n .BYTE 1\n .ELSE\n .BYTE 2\n .ENDIF\n .BYTE 3\n .ENDIF\n .BYTE 4\n",
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![4]);
}

#[test]
fn relocation_tests_pick_branches() {
    let run = assemble(
        "cond-rel",
        "HERE NOP\n .IFREL HERE\n .BYTE 1\n .ENDIF\n .IFABS HERE\n .BYTE 2\n .ENDIF\n \
         .IFNABS HERE\n .BYTE 3\n .ENDIF\n .IFNREL 5\n .BYTE 4\n .ENDIF\n",
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![0, 1, 3, 4]);
}

#[test]
fn unbalanced_else_and_endif_error() {
    for source in [" .ELSE\n", " .ENDIF\n"] {
        let run = assemble("cond-bad", source);
        assert!(run.result.is_err());
        assert_eq!(run.errors(), vec![AsmError::NoOpenIf]);
    }
}

#[test]
fn unterminated_if_fails_the_run() {
    let run = assemble("cond-open", " .IF 1\n NOP\n");
    let err = run.result.as_ref().expect_err("open .IF must fail");
    assert!(err
        .diagnostics()
        .iter()
        .any(|d| d.error() == &AsmError::UnclosedIf && d.severity() == Severity::Error));
}

#[test]
fn macro_expansions_are_identical_and_numbered() {
    let run = assemble(
        "macro",
        "PAIR .MACRO A,B\n .BYTE A,B\n INST\n .ENDM\n PAIR 1,2\n PAIR 1,2\n",
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![1, 2, 1, 1, 2, 2]);
    assert_eq!(run.assembler.state().instance_count(), 2);
    assert!(run.assembler.state().macros().contains("PAIR"));
}

#[test]
fn missing_macro_arguments_substitute_empty_text() {
    let run = assemble(
        "macro-args",
        "ADD1 .MACRO X,Y\n .BYTE X+1 Y\n .ENDM\n ADD1 4\n",
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![5]);
}

#[test]
fn labelled_macro_call_binds_label() {
    let run = assemble("macro-label", "ONE .MACRO\n NOP\n .ENDM\nSITE ONE\n");
    run.assert_ok();
    assert!(run.assembler.symbols().lookup("SITE").is_some());
}

#[test]
fn macro_redefinition_on_first_pass_errors() {
    let run = assemble(
        "macro-dup",
        "M .MACRO\n NOP\n .ENDM\nM .MACRO\n NOP\n .ENDM\n",
    );
    assert!(run.errors().contains(&AsmError::MacroRedefined("M".to_string())));
}

#[test]
fn macro_header_rejects_non_symbol_parameters() {
    let run = assemble("macro-bad", "M .MACRO 1\n .ENDM\n");
    assert!(run.errors().contains(&AsmError::IllegalMacroArgument));
    let run = assemble("macro-bad2", "M .MACRO A B\n .ENDM\n");
    assert!(run.errors().contains(&AsmError::UnexpectedAfterArgument));
}

#[test]
fn unterminated_capture_errors() {
    let run = assemble("macro-open", "M .MACRO\n NOP\n");
    assert!(run.errors().contains(&AsmError::UnclosedCapture(".MACRO")));
}

#[test]
fn stray_closers_error() {
    let run = assemble("closers", " .ENDM\n .ENDR\n");
    assert_eq!(
        run.errors(),
        vec![
            AsmError::UnmatchedClose(".ENDM", ".MACRO"),
            AsmError::UnmatchedClose(".ENDR", ".REPEAT"),
        ]
    );
}

#[test]
fn exitm_abandons_expansion() {
    let run = assemble(
        "exitm",
        "M .MACRO\n .BYTE 1\n .EXITM\n .BYTE 2\n .ENDM\n M\n .BYTE 3\n",
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![1, 3]);

    let run = assemble("exitm-outside", " .EXITM\n");
    assert_eq!(run.errors(), vec![AsmError::NoActiveMacro]);
}

#[test]
fn repeat_replays_block() {
    let run = assemble("repeat", " .REPEAT 3\n NOP\n .BYTE 7\n .ENDR\n .BYTE 9\n");
    run.assert_ok();
    assert_eq!(run.code(), vec![0, 7, 0, 7, 0, 7, 9]);
}

#[test]
fn zero_repeat_emits_nothing() {
    let run = assemble("repeat-zero", " .REPEAT 0\n NOP\n .ENDR\n");
    run.assert_ok();
    assert!(run.code().is_empty());
}

#[test]
fn nested_capture_inside_macro_body() {
    let run = assemble(
        "repeat-nest",
        "M .MACRO\n .REPEAT 2\n NOP\n .ENDR\n .ENDM\n M\n",
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![0, 0]);
}

#[test]
fn set_variables_are_mutable() {
    let run = assemble("set", "N .SET 1\n .BYTE N\nN .SET N+1\n .BYTE N\n");
    run.assert_ok();
    assert_eq!(run.code(), vec![1, 2]);
}

#[test]
fn set_and_equate_do_not_mix() {
    let run = assemble("set-equ", "K .EQU 1\nK .SET 2\n");
    assert!(run.errors().contains(&AsmError::PermanentSymbol("K".to_string())));

    let run = assemble("equ-set", "V .SET 1\nV .EQU 2\n");
    assert!(run.errors().contains(&AsmError::DefinedWithSet));

    let run = assemble("equ-local", "G NOP\n.E .EQU 1\n");
    assert!(run.errors().contains(&AsmError::LocalEquate));
}

#[test]
fn org_label_takes_new_origin() {
    let run = assemble("org", "HERE .ORG $200\n NOP\n");
    run.assert_ok();
    assert_eq!(run.assembler.symbols().lookup("HERE"), Some(&Expr::Value(0x200)));

    let run = assemble("org-rel", "L NOP\n .ORG L\n");
    assert!(run.errors().contains(&AsmError::ConstantRequired));
}

#[test]
fn section_directives_switch_output() {
    let run = assemble(
        "sections",
        " .DATA\nD1 .BYTE 1\n .BSS\n .SPACE 2\n .CODE\n NOP\n",
    );
    run.assert_ok();
    assert_eq!(run.section(DATA_SECTION), vec![1]);
    assert_eq!(run.section(BSS_SECTION), vec![0, 0]);
    assert_eq!(run.code(), vec![0]);
}

#[test]
fn unknown_opcode_errors() {
    let run = assemble("unknown", " FROB 1\n");
    assert_eq!(run.errors(), vec![AsmError::UnknownOpcode]);
}

#[test]
fn label_on_unlabelled_directive_warns() {
    let run = assemble("label-warn", "L .PAGE\n NOP\n");
    run.assert_ok();
    let report = run.result.as_ref().expect("report");
    assert_eq!(report.warning_count(), 1);
    assert_eq!(report.diagnostics()[0].error(), &AsmError::LabelIgnored);
}

#[test]
fn include_searches_include_paths() {
    let dir = create_temp_dir("include-path");
    let inc = dir.join("inc");
    fs::create_dir_all(&inc).expect("Create include dir");
    write_file(&inc.join("defs.asm"), "VALUE .EQU 42\n");
    let options = AssemblerOptions {
        include_paths: vec![inc],
        ..AssemblerOptions::default()
    };
    let run = assemble_with(
        "include",
        Arc::new(ToyCpu::default()),
        options,
        " .INCLUDE \"defs.asm\"\n .BYTE VALUE\n",
        &[],
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![42]);
}

#[test]
fn include_resolves_beside_current_file() {
    let run = assemble_files(
        "include-local",
        " .BYTE 1\n .INCLUDE \"part.asm\"\n .BYTE 3\n",
        &[("part.asm", " .BYTE 2\n")],
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![1, 2, 3]);
}

#[test]
fn missing_include_errors() {
    let run = assemble("include-missing", " .INCLUDE \"nope.asm\"\n");
    assert_eq!(
        run.errors(),
        vec![AsmError::FileNotFound("nope.asm".to_string())]
    );
    let run = assemble("include-bare", " .INCLUDE nope\n");
    assert_eq!(run.errors(), vec![AsmError::ExpectedFilename]);
}

#[test]
fn append_replaces_current_file() {
    let run = assemble_files(
        "append",
        " .BYTE 1\n .APPEND \"next.asm\"\n .BYTE 2\n",
        &[("next.asm", " .BYTE 3\n")],
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![1, 3]);
}

#[test]
fn append_inside_macro_pops_the_expansion() {
    let run = assemble_files(
        "append-macro",
        "M .MACRO\n .APPEND \"tail.asm\"\n .BYTE 9\n .ENDM\n M\n .BYTE 8\n",
        &[("tail.asm", " .BYTE 5\n")],
    );
    run.assert_ok();
    assert_eq!(run.code(), vec![5, 8]);
}

#[test]
fn insert_copies_binary_file() {
    let dir = create_temp_dir("insert-src");
    let blob = dir.join("blob.bin");
    fs::write(&blob, [1u8, 2, 3]).expect("Write blob");
    let source = format!(" .INSERT \"{}\"\n .BYTE 4\n", blob.display());
    let run = assemble("insert", &source);
    run.assert_ok();
    assert_eq!(run.code(), vec![1, 2, 3, 4]);
}

#[test]
fn end_stops_the_pass() {
    let run = assemble("end", " .BYTE 1\n .END\n .BYTE 2\n");
    run.assert_ok();
    assert_eq!(run.code(), vec![1]);
}

#[test]
fn globals_are_exported() {
    let run = assemble("global", " .GLOBAL START\nSTART NOP\n");
    run.assert_ok();
    assert!(run.assembler.module().globals().contains_key("START"));
    let object = run.read("prog.obj");
    assert!(object.contains("<global name=\"START\">"));
}

#[test]
fn undefined_global_fails_without_object() {
    let run = assemble("global-missing", " .GLOBAL MISSING\n NOP\n");
    assert!(run.result.is_err());
    assert!(run
        .errors()
        .contains(&AsmError::UndefinedGlobal("MISSING".to_string())));
    assert!(!run.dir.join("prog.obj").exists());
}

#[test]
fn externs_emit_relocations() {
    let run = assemble("extern", " .EXTERN PUTC\n JMP PUTC\n");
    run.assert_ok();
    assert!(run.assembler.symbols().is_extern("PUTC"));
    let object = run.read("prog.obj");
    assert!(object.contains("<extern name=\"PUTC\"/>"));
}

#[test]
fn extern_requires_symbol_list() {
    let run = assemble("extern-bad", " .EXTERN 5\n");
    assert_eq!(run.errors(), vec![AsmError::ExpectedSymbolList]);
}

#[test]
fn object_file_is_written_on_success() {
    let run = assemble("object", "START NOP\n .BYTE 1,2\n");
    run.assert_ok();
    let object = run.read("prog.obj");
    let mut lines = object.lines();
    assert_eq!(lines.next(), Some("<?xml version='1.0'?>"));
    assert_eq!(
        lines.next(),
        Some("<module name=\"prog.obj\" endian=\"little\">")
    );
}

#[test]
fn failed_run_writes_no_object() {
    let run = assemble("object-fail", " FROB\n");
    assert!(run.result.is_err());
    assert!(!run.dir.join("prog.obj").exists());
}

#[test]
fn listing_marks_line_types_and_dumps_symbols() {
    let run = assemble(
        "listing",
        "START NOP\nCOUNT .EQU 3\n .IF 0\n .BYTE 1\n .ENDIF\nM .MACRO\n NOP\n .ENDM\n M\n",
    );
    run.assert_ok();
    let listing = run.read("prog.lst");
    assert!(listing.contains(":     1 START NOP"), "{listing}");
    assert!(listing.contains("00000003  "), "{listing}");
    assert!(listing.contains("=     2 COUNT .EQU 3"), "{listing}");
    assert!(listing.contains("-     4  .BYTE 1"), "{listing}");
    assert!(listing.contains("+     7  NOP"), "{listing}");
    assert!(listing.contains("Symbol Table"));
    assert!(listing.contains(&format!("{:<32} 00000003\n", "COUNT")));
    assert!(listing.contains(&format!("{:<32} 00000000'\n", "START")));
}

#[test]
fn listing_title_and_nolist() {
    let run = assemble(
        "listing-title",
        " .TITLE \"Demo Title\"\n .NOLIST\nHIDDEN NOP\n .LIST\nSHOWN NOP\n",
    );
    run.assert_ok();
    let listing = run.read("prog.lst");
    assert!(!listing.contains("HIDDEN NOP"));
    assert!(listing.contains("SHOWN NOP"));
    assert!(listing.contains("Demo Title"));
}

#[test]
fn listing_is_optional() {
    let options = AssemblerOptions {
        write_listing: false,
        ..AssemblerOptions::default()
    };
    let run = assemble_with(
        "no-listing",
        Arc::new(ToyCpu::default()),
        options,
        " NOP\n",
        &[],
    );
    run.assert_ok();
    assert!(!run.dir.join("prog.lst").exists());
    assert!(run.dir.join("prog.obj").exists());
}

#[test]
fn unsupported_passes_are_skipped() {
    let cpu = Arc::new(ToyCpu {
        skip_intermediate: true,
        ..ToyCpu::default()
    });
    let run = assemble_with(
        "skip-pass",
        cpu.clone(),
        AssemblerOptions::default(),
        " NOP\n",
        &[],
    );
    run.assert_ok();
    let passes = cpu.passes.lock().expect("passes").clone();
    assert_eq!(passes, vec![Pass::First, Pass::Final]);
}

#[test]
fn missing_source_is_reported() {
    let mut assembler = Assembler::new(Arc::new(ToyCpu::default()), AssemblerOptions::default());
    let err = assembler
        .assemble(Path::new("no/such/source.asm"))
        .expect_err("missing source");
    assert!(matches!(
        err.diagnostics()[0].error(),
        AsmError::SourceNotFound(_)
    ));
}

#[test]
fn state_processes_lines_in_isolation() {
    let mut state = AssemblerState::new(Arc::new(ToyCpu::default()), AssemblerOptions::default());
    state.start_pass(Pass::Final);
    let file: Rc<str> = Rc::from("inline.asm");
    state.process_line(Line::new(Rc::clone(&file), 1, "VALUE .EQU $41"), false);
    state.process_line(Line::new(Rc::clone(&file), 2, " .BYTE VALUE, LO $1234"), false);
    assert_eq!(state.counts().errors, 0);
    let code = state
        .module()
        .section_named(CODE_SECTION)
        .map(|section| section.bytes());
    assert_eq!(code, Some(vec![0x41, 0x34]));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn repeat_emits_count_copies(count in 0u32..24) {
        let source = format!(" .REPEAT {count}\n NOP\n .BYTE 1\n .ENDR\n");
        let run = assemble("repeat-prop", &source);
        prop_assert!(run.result.is_ok());
        let expected: Vec<u8> = (0..count).flat_map(|_| [0u8, 1]).collect();
        prop_assert_eq!(run.code(), expected);
    }

    #[test]
    fn absolute_expressions_are_pass_independent(a in 0i64..0x7FFF, b in 1i64..0xFF) {
        let source = format!(" .WORD {a}+{b}*2-({a}/{b})\n");
        let run = assemble("expr-prop", &source);
        prop_assert!(run.result.is_ok());
        let value = (a + b * 2 - a / b) as u16;
        prop_assert_eq!(run.code(), value.to_le_bytes().to_vec());
    }
}
