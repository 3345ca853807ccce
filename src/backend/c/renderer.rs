//! C source rendering of interpreted functions

use super::{CCode, ENTRY_EVAL, ENTRY_INIT, ENTRY_N_OPS, ENTRY_SPARSITY};
use crate::error::Result;
use crate::function::{Algorithm, Function, Instruction, SxFunction};
use crate::sx::UnaryOp;
use log::debug;
use std::fmt::Write;

/// Work variables declared per line
const DECLS_PER_LINE: usize = 16;

/// Renders an initialized [`SxFunction`] as a self-contained C file
///
/// The file exports the entry points named in [`super`] and nothing
/// else. The output depends only on the function graph, so rendering the
/// same graph twice gives identical text.
#[derive(Debug, Default)]
pub struct CRenderer {
    indent_level: usize,
}

impl CRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, function: &SxFunction) -> Result<CCode> {
        let algorithm = function.algorithm()?;
        let mut buffer = String::new();

        writeln!(
            buffer,
            "/* {}: generated by symgrad, {} elementary operations */",
            function.name(),
            algorithm.len()
        )
        .unwrap();
        buffer.push_str(&self.render_includes());
        buffer.push_str(&self.render_init(algorithm));
        buffer.push('\n');
        buffer.push_str(&self.render_sparsity(algorithm));
        buffer.push('\n');
        buffer.push_str(&self.render_n_ops(algorithm));
        buffer.push('\n');
        buffer.push_str(&self.render_eval(algorithm));

        debug!("Rendered {} bytes of C code", buffer.len());
        Ok(CCode::new(buffer))
    }

    fn render_includes(&self) -> String {
        "#include <math.h>\n\n".to_string()
    }

    fn render_init(&mut self, algorithm: &Algorithm) -> String {
        let mut buffer = String::new();
        writeln!(buffer, "int {ENTRY_INIT}(int* n_in, int* n_out)").unwrap();
        buffer.push_str("{\n");
        self.indent_level += 1;
        self.line(&mut buffer, &format!("*n_in = {};", algorithm.input_shapes().len()));
        self.line(&mut buffer, &format!("*n_out = {};", algorithm.output_shapes().len()));
        self.line(&mut buffer, "return 0;");
        self.indent_level -= 1;
        buffer.push_str("}\n");
        buffer
    }

    fn render_sparsity(&mut self, algorithm: &Algorithm) -> String {
        let mut buffer = String::new();
        writeln!(buffer, "int {ENTRY_SPARSITY}(int i, int* nrow, int* ncol)").unwrap();
        buffer.push_str("{\n");
        self.indent_level += 1;
        self.line(&mut buffer, "switch (i) {");
        let shapes = algorithm
            .input_shapes()
            .iter()
            .chain(algorithm.output_shapes());
        for (i, (rows, cols)) in shapes.enumerate() {
            self.line(
                &mut buffer,
                &format!("case {i}: *nrow = {rows}; *ncol = {cols}; return 0;"),
            );
        }
        self.line(&mut buffer, "default: return 1;");
        self.line(&mut buffer, "}");
        self.indent_level -= 1;
        buffer.push_str("}\n");
        buffer
    }

    fn render_n_ops(&mut self, algorithm: &Algorithm) -> String {
        let mut buffer = String::new();
        writeln!(buffer, "int {ENTRY_N_OPS}(void)").unwrap();
        buffer.push_str("{\n");
        self.indent_level += 1;
        self.line(&mut buffer, &format!("return {};", algorithm.len()));
        self.indent_level -= 1;
        buffer.push_str("}\n");
        buffer
    }

    fn render_eval(&mut self, algorithm: &Algorithm) -> String {
        let mut buffer = String::new();
        writeln!(buffer, "int {ENTRY_EVAL}(const double** x, double** r)").unwrap();
        buffer.push_str("{\n");
        self.indent_level += 1;
        let slots: Vec<String> = (0..algorithm.work_size()).map(|k| format!("a{k}")).collect();
        for chunk in slots.chunks(DECLS_PER_LINE) {
            self.line(&mut buffer, &format!("double {};", chunk.join(", ")));
        }
        for instruction in algorithm {
            let statement = self.render_instruction(instruction);
            self.line(&mut buffer, &statement);
        }
        self.line(&mut buffer, "return 0;");
        self.indent_level -= 1;
        buffer.push_str("}\n");
        buffer
    }

    pub fn render_instruction(&self, instruction: &Instruction) -> String {
        match *instruction {
            Instruction::Input {
                res,
                input,
                element,
            } => format!("a{res} = x[{input}][{element}];"),
            Instruction::Const { res, value } => format!("a{res} = {};", self.render_const(value)),
            Instruction::Unary { op, res, arg } => match op {
                UnaryOp::Neg => format!("a{res} = -a{arg};"),
                UnaryOp::Sq => format!("a{res} = a{arg} * a{arg};"),
                _ => format!(
                    "a{res} = {}(a{arg});",
                    op.c_function().unwrap_or_default()
                ),
            },
            Instruction::Binary { op, res, lhs, rhs } => {
                format!("a{res} = a{lhs} {} a{rhs};", op.symbol())
            }
            Instruction::Output {
                output,
                element,
                arg,
            } => format!("if (r[{output}]) r[{output}][{element}] = a{arg};"),
        }
    }

    pub fn render_const(&self, value: f64) -> String {
        if value.is_infinite() {
            if value.is_sign_negative() {
                "(-INFINITY)".to_string()
            } else {
                "INFINITY".to_string()
            }
        } else if value.is_nan() {
            "NAN".to_string()
        } else {
            format!("{value:?}")
        }
    }

    fn line(&self, buffer: &mut String, text: &str) {
        for _ in 0..self.indent_level {
            buffer.push('\t');
        }
        buffer.push_str(text);
        buffer.push('\n');
    }
}
