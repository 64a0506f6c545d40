//! Math rendering.
//!
//! Renderers turn LaTeX source into target markup. A failed render never
//! aborts the document: [`render_or_fallback`] hands back the delimited source
//! so the caller can print it as flagged literal text.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("unbalanced braces or brackets")]
    Unbalanced,
    #[error("unsupported command \\{0}")]
    UnknownCommand(String),
    #[error("\\{0} is missing an argument")]
    MissingArgument(String),
    #[error("expression nested too deeply")]
    TooDeep,
    #[error("KaTeX: {0}")]
    Katex(String),
}

/// Converts LaTeX into markup for one output target.
pub trait MathRenderer {
    fn render_math(&self, latex: &str, display: bool) -> Result<String, MathError>;
}

/// Outcome of rendering one math expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MathMarkup {
    Rendered(String),
    /// `source` is the literal input including its `\( \)` or `\[ \]` delimiters.
    Fallback { source: String, error: MathError },
}

/// The expression as it was written in the document.
pub fn delimited(latex: &str, display: bool) -> String {
    if display {
        format!("\\[{latex}\\]")
    } else {
        format!("\\({latex}\\)")
    }
}

pub fn render_or_fallback(renderer: &dyn MathRenderer, latex: &str, display: bool) -> MathMarkup {
    match renderer.render_math(latex, display) {
        Ok(markup) => MathMarkup::Rendered(markup),
        Err(error) => {
            log::warn!("Rendering math as source text ({error}): {latex}");
            MathMarkup::Fallback {
                source: delimited(latex, display),
                error,
            }
        }
    }
}

/// Typst math markup, translated from a practical LaTeX subset.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypstMath;

impl MathRenderer for TypstMath {
    fn render_math(&self, latex: &str, display: bool) -> Result<String, MathError> {
        let body = to_typst(latex)?;
        Ok(if display {
            format!("$ {body} $")
        } else {
            format!("${body}$")
        })
    }
}

/// HTML typeset by KaTeX. Pages only need the KaTeX stylesheet.
#[derive(Debug, Default, Clone, Copy)]
pub struct KatexMath;

impl MathRenderer for KatexMath {
    fn render_math(&self, latex: &str, display: bool) -> Result<String, MathError> {
        check_braces(latex)?;
        let opts = katex::Opts::builder()
            .display_mode(display)
            .build()
            .map_err(|e| MathError::Katex(e.to_string()))?;
        let html =
            katex::render_with_opts(latex, opts).map_err(|e| MathError::Katex(e.to_string()))?;
        Ok(if display {
            format!("<div class=\"math math-display\">{html}</div>")
        } else {
            format!("<span class=\"math math-inline\">{html}</span>")
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// Name after the backslash: a run of letters or one other character.
    Command(&'a str),
    Open,
    Close,
    Sup,
    Sub,
    Space,
    Char(char),
}

fn tokenize(latex: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut chars = latex.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let token = match c {
            '\\' => {
                let start = i + 1;
                match chars.peek().copied() {
                    Some((_, next)) if next.is_ascii_alphabetic() => {
                        let mut end = start;
                        while let Some(&(j, next)) = chars.peek() {
                            if !next.is_ascii_alphabetic() {
                                break;
                            }
                            end = j + next.len_utf8();
                            chars.next();
                        }
                        Token::Command(&latex[start..end])
                    }
                    Some((_, next)) => {
                        chars.next();
                        Token::Command(&latex[start..start + next.len_utf8()])
                    }
                    None => Token::Command(""),
                }
            }
            '{' => Token::Open,
            '}' => Token::Close,
            '^' => Token::Sup,
            '_' => Token::Sub,
            c if c.is_whitespace() => {
                while chars.peek().is_some_and(|&(_, next)| next.is_whitespace()) {
                    chars.next();
                }
                Token::Space
            }
            c => Token::Char(c),
        };
        tokens.push(token);
    }

    tokens
}

/// Fails when `{` and `}` do not pair up or nest deeper than `MAX_DEPTH`.
/// Escaped braces are ignored.
pub fn check_braces(latex: &str) -> Result<(), MathError> {
    let mut depth = 0usize;
    for token in tokenize(latex) {
        match token {
            Token::Open if depth == MAX_DEPTH => return Err(MathError::TooDeep),
            Token::Open => depth += 1,
            Token::Close => depth = depth.checked_sub(1).ok_or(MathError::Unbalanced)?,
            _ => {}
        }
    }
    if depth == 0 {
        Ok(())
    } else {
        Err(MathError::Unbalanced)
    }
}

/// Translate LaTeX into the body of a Typst equation.
pub fn to_typst(latex: &str) -> Result<String, MathError> {
    check_braces(latex)?;
    let mut translator = Translator {
        tokens: tokenize(latex),
        pos: 0,
        depth: 0,
    };
    let body = translator.sequence(Stop::End)?;
    let body = body.trim();
    check_delimiters(body)?;
    Ok(body.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    End,
    Brace,
    Bracket,
}

/// Deepest nesting of groups and command arguments accepted.
const MAX_DEPTH: usize = 64;

struct Translator<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    depth: usize,
}

impl<'a> Translator<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(Token::Space) {
            self.pos += 1;
        }
    }

    /// Translate tokens up to `stop`, consuming the terminator.
    fn sequence(&mut self, stop: Stop) -> Result<String, MathError> {
        let mut out = String::new();
        loop {
            match (self.peek(), stop) {
                (None, Stop::End) => return Ok(out),
                (None, _) => return Err(MathError::Unbalanced),
                (Some(Token::Close), Stop::Brace) | (Some(Token::Char(']')), Stop::Bracket) => {
                    self.pos += 1;
                    return Ok(out);
                }
                (Some(Token::Close), _) => return Err(MathError::Unbalanced),
                _ => self.atom(&mut out)?,
            }
        }
    }

    /// Translate exactly one token (or one braced group) onto `out`.
    fn atom(&mut self, out: &mut String) -> Result<(), MathError> {
        if self.depth == MAX_DEPTH {
            return Err(MathError::TooDeep);
        }
        self.depth += 1;
        let result = self.translate_atom(out);
        self.depth -= 1;
        result
    }

    fn translate_atom(&mut self, out: &mut String) -> Result<(), MathError> {
        let Some(token) = self.next() else {
            return Ok(());
        };
        match token {
            Token::Open => {
                let group = self.sequence(Stop::Brace)?;
                push_atom(out, group.trim());
            }
            Token::Close => return Err(MathError::Unbalanced),
            Token::Sup | Token::Sub => {
                let marker = if token == Token::Sup { "^" } else { "_" };
                let arg = self.argument(marker)?;
                while out.ends_with(' ') {
                    out.pop();
                }
                out.push_str(marker);
                out.push('(');
                out.push_str(&arg);
                out.push(')');
            }
            Token::Space => {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            Token::Char(c) => push_atom(out, &char_markup(c)),
            Token::Command(name) => {
                let markup = self.command(name)?;
                push_atom(out, &markup);
            }
        }
        Ok(())
    }

    /// A braced group or a single token following a command.
    fn argument(&mut self, command: &str) -> Result<String, MathError> {
        self.skip_spaces();
        let arg = match self.peek() {
            None | Some(Token::Close) => {
                return Err(MathError::MissingArgument(command.to_string()));
            }
            Some(Token::Open) => {
                self.pos += 1;
                self.sequence(Stop::Brace)?
            }
            Some(_) => {
                let mut out = String::new();
                self.atom(&mut out)?;
                out
            }
        };
        let arg = arg.trim();
        check_delimiters(arg)?;
        Ok(if arg.is_empty() {
            "\"\"".to_string()
        } else {
            arg.to_string()
        })
    }

    /// Literal text of a braced group, as used by `\text{...}` and colours.
    fn text_argument(&mut self, command: &str) -> Result<String, MathError> {
        self.skip_spaces();
        match self.next() {
            Some(Token::Open) => {}
            Some(Token::Char(c)) => return Ok(c.to_string()),
            _ => return Err(MathError::MissingArgument(command.to_string())),
        }
        let mut text = String::new();
        let mut depth = 1usize;
        while let Some(token) = self.next() {
            match token {
                Token::Open => depth += 1,
                Token::Close => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                }
                Token::Sup => text.push('^'),
                Token::Sub => text.push('_'),
                Token::Space => text.push(' '),
                Token::Char(c) => text.push(c),
                Token::Command(name) => text.push_str(name),
            }
        }
        Err(MathError::Unbalanced)
    }

    fn command(&mut self, name: &str) -> Result<String, MathError> {
        if let Some(symbol) = symbol(name) {
            return Ok(symbol.to_string());
        }
        if let Some(function) = wrapper(name) {
            let arg = self.argument(name)?;
            return Ok(format!("{function}({arg})"));
        }
        match name {
            "frac" | "dfrac" | "tfrac" | "cfrac" => {
                let numerator = self.argument(name)?;
                let denominator = self.argument(name)?;
                Ok(format!("frac({numerator}, {denominator})"))
            }
            "sqrt" => {
                self.skip_spaces();
                if self.peek() == Some(Token::Char('[')) {
                    self.pos += 1;
                    let index = self.sequence(Stop::Bracket)?;
                    check_delimiters(&index)?;
                    let radicand = self.argument(name)?;
                    Ok(format!("root({}, {radicand})", index.trim()))
                } else {
                    Ok(format!("sqrt({})", self.argument(name)?))
                }
            }
            "text" | "textrm" | "textit" | "textnormal" | "mbox" => {
                Ok(quote(&self.text_argument(name)?))
            }
            "textbf" => Ok(format!("bold({})", quote(&self.text_argument(name)?))),
            // Notes print in black, so colours are dropped.
            "color" => {
                self.text_argument(name)?;
                Ok(String::new())
            }
            "textcolor" => {
                self.text_argument(name)?;
                self.argument(name)
            }
            "left" | "right" | "big" | "Big" | "bigg" | "Bigg" | "bigl" | "bigr" | "Bigl"
            | "Bigr" => {
                self.skip_spaces();
                if self.peek() == Some(Token::Char('.')) {
                    self.pos += 1;
                    return Ok(String::new());
                }
                if self.peek().is_none() {
                    return Err(MathError::MissingArgument(name.to_string()));
                }
                let mut delimiter = String::new();
                self.atom(&mut delimiter)?;
                Ok(delimiter)
            }
            "displaystyle" | "textstyle" | "limits" | "nolimits" | "!" => Ok(String::new()),
            _ => Err(MathError::UnknownCommand(name.to_string())),
        }
    }
}

/// Typst reads function arguments as delimited groups, so `(` `)` and `[` `]`
/// inside one must pair up. Escaped characters and string literals are skipped.
fn check_delimiters(markup: &str) -> Result<(), MathError> {
    let mut open = Vec::new();
    let mut chars = markup.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '"' => {
                while let Some(c) = chars.next() {
                    match c {
                        '\\' => {
                            chars.next();
                        }
                        '"' => break,
                        _ => {}
                    }
                }
            }
            '(' | '[' => open.push(c),
            ')' | ']' => {
                let opener = if c == ')' { '(' } else { '[' };
                if open.pop() != Some(opener) {
                    return Err(MathError::Unbalanced);
                }
            }
            _ => {}
        }
    }
    if open.is_empty() {
        Ok(())
    } else {
        Err(MathError::Unbalanced)
    }
}

/// Append `markup`, keeping adjacent letters apart so Typst does not read
/// them as one multi-letter identifier.
fn push_atom(out: &mut String, markup: &str) {
    let (Some(last), Some(first)) = (out.chars().last(), markup.chars().next()) else {
        out.push_str(markup);
        return;
    };
    let both_digits = last.is_ascii_digit() && first.is_ascii_digit();
    if last.is_alphanumeric() && first.is_alphanumeric() && !both_digits {
        out.push(' ');
    }
    out.push_str(markup);
}

fn char_markup(c: char) -> String {
    match c {
        '/' | ',' | ';' | '#' | '$' | '"' | '@' | '\\' => format!("\\{c}"),
        '~' => " ".to_string(),
        _ => c.to_string(),
    }
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

const GREEK: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
    "lambda", "mu", "nu", "xi", "omicron", "pi", "rho", "sigma", "tau", "upsilon", "phi", "chi",
    "psi", "omega", "Gamma", "Delta", "Theta", "Lambda", "Xi", "Pi", "Sigma", "Upsilon", "Phi",
    "Psi", "Omega",
];

const OPERATORS: &[&str] = &[
    "sin", "cos", "tan", "cot", "sec", "csc", "arcsin", "arccos", "arctan", "sinh", "cosh",
    "tanh", "log", "ln", "lg", "exp", "lim", "max", "min", "det", "gcd", "sup", "inf", "mod",
];

fn symbol(name: &str) -> Option<&'static str> {
    if let Some(same) = GREEK
        .iter()
        .chain(OPERATORS)
        .find(|known| **known == name)
        .copied()
    {
        return Some(same);
    }
    let symbol = match name {
        "varepsilon" => "epsilon.alt",
        "varphi" => "phi.alt",
        "vartheta" => "theta.alt",
        "ell" => "ell",
        "times" => "times",
        "cdot" => "dot.op",
        "div" => "div",
        "pm" => "plus.minus",
        "mp" => "minus.plus",
        "le" | "leq" => "<=",
        "ge" | "geq" => ">=",
        "ne" | "neq" => "!=",
        "ll" => "<<",
        "gg" => ">>",
        "approx" => "approx",
        "equiv" => "equiv",
        "sim" => "tilde.op",
        "propto" => "prop",
        "to" | "rightarrow" => "->",
        "leftarrow" | "gets" => "<-",
        "Rightarrow" | "implies" => "=>",
        "leftrightarrow" => "<->",
        "Leftrightarrow" | "iff" => "<=>",
        "mapsto" => "|->",
        "infty" => "infinity",
        "partial" => "partial",
        "nabla" => "nabla",
        "forall" => "forall",
        "exists" => "exists",
        "in" => "in",
        "notin" => "in.not",
        "subset" => "subset",
        "subseteq" => "subset.eq",
        "supset" => "supset",
        "emptyset" | "varnothing" => "emptyset",
        "sum" => "sum",
        "prod" => "product",
        "int" => "integral",
        "iint" => "integral.double",
        "oint" => "integral.cont",
        "ldots" | "dots" => "dots",
        "cdots" => "dots.c",
        "vdots" => "dots.v",
        "circ" => "compose",
        "degree" => "degree",
        "angle" => "angle",
        "perp" => "perp",
        "parallel" => "parallel",
        "neg" | "lnot" => "not",
        "land" | "wedge" => "and",
        "lor" | "vee" => "or",
        "quad" => "quad",
        "qquad" => "wide",
        "," => "thin",
        ";" | ":" => "med",
        " " => "space",
        "\\" => "\\ ",
        "{" => "\\{",
        "}" => "\\}",
        "%" => "%",
        "&" => "\\&",
        "_" => "\\_",
        "#" => "\\#",
        "$" => "\\$",
        _ => return None,
    };
    Some(symbol)
}

/// Commands that wrap one argument in a Typst function.
fn wrapper(name: &str) -> Option<&'static str> {
    let function = match name {
        "hat" | "widehat" => "hat",
        "bar" | "overline" => "overline",
        "underline" => "underline",
        "vec" | "overrightarrow" => "arrow",
        "dot" => "dot",
        "ddot" => "dot.double",
        "tilde" | "widetilde" => "tilde",
        "mathbf" | "boldsymbol" | "bm" => "bold",
        "mathrm" | "operatorname" => "upright",
        "mathit" => "italic",
        "mathcal" => "cal",
        "mathbb" => "bb",
        "mathsf" => "sans",
        "mathtt" => "mono",
        _ => return None,
    };
    Some(function)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl MathRenderer for Failing {
        fn render_math(&self, _latex: &str, _display: bool) -> Result<String, MathError> {
            Err(MathError::UnknownCommand("anything".into()))
        }
    }

    #[test]
    fn fallback_keeps_delimited_source() {
        assert_eq!(
            render_or_fallback(&Failing, "x^2", false),
            MathMarkup::Fallback {
                source: "\\(x^2\\)".into(),
                error: MathError::UnknownCommand("anything".into()),
            }
        );
        let MathMarkup::Fallback { source, .. } = render_or_fallback(&Failing, "E", true) else {
            panic!("expected fallback");
        };
        assert_eq!(source, "\\[E\\]");
    }

    #[test]
    fn braces_must_balance() {
        assert_eq!(check_braces("\\frac{a}{b}"), Ok(()));
        assert_eq!(check_braces("\\{ a \\}"), Ok(()));
        assert_eq!(check_braces("{a"), Err(MathError::Unbalanced));
        assert_eq!(check_braces("a}{"), Err(MathError::Unbalanced));
    }

    #[test]
    fn scripts_and_letters() {
        assert_eq!(to_typst("a^2 + b^2 = c^2").unwrap(), "a^(2) + b^(2) = c^(2)");
        assert_eq!(to_typst("x_{i}^{10}").unwrap(), "x_(i)^(10)");
        assert_eq!(to_typst("dx").unwrap(), "d x");
        assert_eq!(to_typst("3.14").unwrap(), "3.14");
    }

    #[test]
    fn colour_wrappers_are_dropped() {
        assert_eq!(
            to_typst("\\color{black}{PV = nRT}").unwrap(),
            "P V = n R T"
        );
        assert_eq!(to_typst("\\textcolor{red}{x}").unwrap(), "x");
    }

    #[test]
    fn fractions_and_roots() {
        assert_eq!(to_typst("\\frac{1}{2}").unwrap(), "frac(1, 2)");
        assert_eq!(to_typst("\\dfrac12").unwrap(), "frac(1, 2)");
        assert_eq!(to_typst("\\sqrt{x}").unwrap(), "sqrt(x)");
        assert_eq!(to_typst("\\sqrt[3]{x}").unwrap(), "root(3, x)");
        assert_eq!(
            to_typst("\\frac{-b \\pm \\sqrt{b^2-4ac}}{2a}").unwrap(),
            "frac(-b plus.minus sqrt(b^(2)-4 a c), 2 a)"
        );
    }

    #[test]
    fn symbols_and_text() {
        assert_eq!(to_typst("\\alpha \\leq \\beta").unwrap(), "alpha <= beta");
        assert_eq!(to_typst("90^\\circ").unwrap(), "90^(compose)");
        assert_eq!(to_typst("\\text{if } x > 0").unwrap(), "\"if \" x > 0");
        assert_eq!(to_typst("f(a, b)").unwrap(), "f(a\\, b)");
        assert_eq!(to_typst("\\left( x \\right)").unwrap(), "( x )");
    }

    #[test]
    fn unsupported_input_is_an_error() {
        assert_eq!(
            to_typst("\\begin{matrix} a \\end{matrix}"),
            Err(MathError::UnknownCommand("begin".into()))
        );
        assert_eq!(
            to_typst("\\frac{1}"),
            Err(MathError::MissingArgument("frac".into()))
        );
        assert_eq!(to_typst("x^"), Err(MathError::MissingArgument("^".into())));
        assert_eq!(to_typst("\\sqrt[3"), Err(MathError::Unbalanced));
        assert_eq!(to_typst("trailing \\"), Err(MathError::UnknownCommand(String::new())));
    }

    #[test]
    fn typst_renderer_delimits() {
        assert_eq!(TypstMath.render_math("x", false).unwrap(), "$x$");
        assert_eq!(TypstMath.render_math("x", true).unwrap(), "$ x $");
    }

    #[test]
    fn katex_renders_html() {
        let inline = KatexMath.render_math("a<b", false).unwrap();
        assert!(inline.starts_with("<span class=\"math math-inline\">"));
        assert!(inline.contains("class=\"katex\""));
        assert!(inline.contains("katex-html"));

        let display = KatexMath.render_math("\\frac{1}{2}", true).unwrap();
        assert!(display.starts_with("<div class=\"math math-display\">"));
        assert!(display.contains("katex-display"));
    }

    #[test]
    fn katex_rejections_are_errors() {
        assert!(matches!(
            KatexMath.render_math("\\frac{a}", false),
            Err(MathError::Katex(_))
        ));
        assert!(matches!(
            KatexMath.render_math("\\notacommand", true),
            Err(MathError::Katex(_))
        ));
        assert_eq!(KatexMath.render_math("{", true), Err(MathError::Unbalanced));
    }

    #[test]
    fn unpaired_parens_in_arguments_are_errors() {
        assert_eq!(to_typst("\\frac{(a}{b)}"), Err(MathError::Unbalanced));
        assert_eq!(to_typst("\\hat{[}"), Err(MathError::Unbalanced));
        assert_eq!(to_typst("\\mathbf{[}a"), Err(MathError::Unbalanced));
        assert_eq!(to_typst("x^("), Err(MathError::Unbalanced));
        assert_eq!(to_typst("\\sqrt[(]{x}"), Err(MathError::Unbalanced));
        assert_eq!(to_typst("\\sin(x"), Err(MathError::Unbalanced));
        assert_eq!(to_typst("\\frac{f(a, b)}{[c]}").unwrap(), "frac(f(a\\, b), [c])");
        assert_eq!(to_typst("\\text{(}").unwrap(), "\"(\"");
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let nested = format!("{}x{}", "{".repeat(20_000), "}".repeat(20_000));
        assert_eq!(to_typst(&nested), Err(MathError::TooDeep));
        assert_eq!(KatexMath.render_math(&nested, false), Err(MathError::TooDeep));

        let hats = "\\hat ".repeat(20_000) + "x";
        assert_eq!(to_typst(&hats), Err(MathError::TooDeep));

        let fine = format!("{}x{}", "{".repeat(10), "}".repeat(10));
        assert_eq!(to_typst(&fine).unwrap(), "x");
    }
}
