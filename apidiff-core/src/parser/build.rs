//! Build constraints: which files of a package take part in one build.
//!
//! A package is loaded for a single target platform, the way the Go tool
//! loads it. Files are excluded by a `_GOOS`, `_GOARCH` or `_GOOS_GOARCH`
//! file name suffix, or by a `//go:build` (or legacy `// +build`) line in
//! the file header.

use serde::{Deserialize, Serialize};
use tracing::warn;

const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js",
    "linux", "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips",
    "mipsle", "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le",
    "riscv", "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

/// Newest `go1.N` release tag considered satisfied.
const LATEST_GO_MINOR: u32 = 24;

/// The platform and tags a package is loaded for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildContext {
    pub goos: String,
    pub goarch: String,

    /// Whether cgo files (`import "C"`) and `cgo` constraints apply.
    pub cgo: bool,

    /// Extra build tags, as with `go build -tags`.
    pub tags: Vec<String>,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self {
            goos: "linux".to_string(),
            goarch: "amd64".to_string(),
            cgo: false,
            tags: Vec::new(),
        }
    }
}

impl BuildContext {
    pub fn new(goos: &str, goarch: &str) -> Self {
        Self {
            goos: goos.to_string(),
            goarch: goarch.to_string(),
            ..Self::default()
        }
    }

    /// Whether a single build tag is satisfied.
    pub fn matches_tag(&self, tag: &str) -> bool {
        if tag == self.goos || tag == self.goarch || tag == "gc" {
            return true;
        }
        match tag {
            "unix" => return UNIX_OS.contains(&self.goos.as_str()),
            "cgo" => return self.cgo,
            "linux" if self.goos == "android" => return true,
            "solaris" if self.goos == "illumos" => return true,
            "darwin" if self.goos == "ios" => return true,
            _ => {}
        }
        if let Some(minor) = tag.strip_prefix("go1.") {
            return minor.parse::<u32>().is_ok_and(|m| m <= LATEST_GO_MINOR);
        }
        self.tags.iter().any(|t| t == tag)
    }

    /// Whether the `_GOOS`/`_GOARCH` suffixes of `file_name` allow it.
    pub fn matches_file_name(&self, file_name: &str) -> bool {
        let stem = file_name.split('.').next().unwrap_or(file_name);
        let Some(index) = stem.find('_') else {
            return true;
        };
        let mut parts: Vec<&str> = stem[index..].split('_').collect();
        if parts.last() == Some(&"test") {
            parts.pop();
        }

        let n = parts.len();
        if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            return self.matches_tag(parts[n - 2]) && self.matches_tag(parts[n - 1]);
        }
        match parts.last() {
            Some(last) if KNOWN_OS.contains(last) || KNOWN_ARCH.contains(last) => {
                self.matches_tag(last)
            }
            _ => true,
        }
    }

    /// Whether the header constraints of `source` allow it.
    ///
    /// A `//go:build` line takes precedence over `// +build` lines. A
    /// constraint that does not parse is reported and ignored.
    pub fn matches_source(&self, file_name: &str, source: &str) -> bool {
        let header = header_constraints(source);

        if let Some(expr) = header.go_build {
            return match Expr::parse(expr) {
                Ok(expr) => expr.eval(&|tag| self.matches_tag(tag)),
                Err(message) => {
                    warn!("{}: invalid //go:build line: {}", file_name, message);
                    true
                }
            };
        }

        header
            .plus_build
            .iter()
            .all(|line| self.matches_plus_build(line))
    }

    /// Whether a file takes part in the build at all.
    pub fn matches(&self, file_name: &str, source: &str) -> bool {
        self.matches_file_name(file_name) && self.matches_source(file_name, source)
    }

    /// `// +build a,b c` means `(a && b) || c`.
    fn matches_plus_build(&self, line: &str) -> bool {
        line.split_whitespace().any(|option| {
            option.split(',').all(|term| match term.strip_prefix('!') {
                Some(tag) => !self.matches_tag(tag),
                None => self.matches_tag(term),
            })
        })
    }
}

#[derive(Debug, Default)]
struct Header<'s> {
    go_build: Option<&'s str>,
    plus_build: Vec<&'s str>,
}

/// Constraint lines found before the package clause.
fn header_constraints(source: &str) -> Header<'_> {
    let mut header = Header::default();
    let mut in_block = false;

    for line in source.lines() {
        let line = line.trim();
        if in_block {
            if line.contains("*/") {
                in_block = false;
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        if line.starts_with("/*") {
            in_block = !line.contains("*/");
            continue;
        }
        let Some(comment) = line.strip_prefix("//") else {
            break;
        };
        if let Some(expr) = comment.strip_prefix("go:build") {
            if header.go_build.is_none() && (expr.is_empty() || expr.starts_with([' ', '\t'])) {
                header.go_build = Some(expr.trim());
            }
        } else if let Some(rest) = comment.trim_start().strip_prefix("+build") {
            if rest.is_empty() || rest.starts_with([' ', '\t']) {
                header.plus_build.push(rest.trim());
            }
        }
    }
    header
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token<'s> {
    Tag(&'s str),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token<'_>>, String> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let rest = &input[pos..];
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
        } else if rest.starts_with("&&") {
            tokens.push(Token::And);
            pos += 2;
        } else if rest.starts_with("||") {
            tokens.push(Token::Or);
            pos += 2;
        } else if c == b'!' {
            tokens.push(Token::Not);
            pos += 1;
        } else if c == b'(' {
            tokens.push(Token::Open);
            pos += 1;
        } else if c == b')' {
            tokens.push(Token::Close);
            pos += 1;
        } else if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' {
            let len = rest
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '.'))
                .unwrap_or(rest.len());
            tokens.push(Token::Tag(&rest[..len]));
            pos += len;
        } else {
            return Err(format!("unexpected character {:?}", rest.chars().next()));
        }
    }
    Ok(tokens)
}

/// A parsed `//go:build` expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expr {
    Tag(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn parse(input: &str) -> Result<Expr, String> {
        let tokens = tokenize(input)?;
        let mut parser = ExprParser { tokens, pos: 0 };
        let expr = parser.or()?;
        if parser.pos != parser.tokens.len() {
            return Err("unexpected trailing tokens".to_string());
        }
        Ok(expr)
    }

    pub fn eval<F: Fn(&str) -> bool>(&self, tag: &F) -> bool {
        match self {
            Expr::Tag(name) => tag(name),
            Expr::Not(inner) => !inner.eval(tag),
            Expr::And(l, r) => l.eval(tag) && r.eval(tag),
            Expr::Or(l, r) => l.eval(tag) || r.eval(tag),
        }
    }
}

/// Precedence: `!` binds tighter than `&&`, which binds tighter than `||`.
struct ExprParser<'s> {
    tokens: Vec<Token<'s>>,
    pos: usize,
}

impl<'s> ExprParser<'s> {
    fn peek(&self) -> Option<&Token<'s>> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token<'s>> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or(&mut self) -> Result<Expr, String> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            left = Expr::Or(Box::new(left), Box::new(self.and()?));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, String> {
        let mut left = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            left = Expr::And(Box::new(left), Box::new(self.not()?));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, String> {
        match self.next() {
            Some(Token::Not) => Ok(Expr::Not(Box::new(self.not()?))),
            Some(Token::Open) => {
                let inner = self.or()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err("missing )".to_string()),
                }
            }
            Some(Token::Tag(name)) => Ok(Expr::Tag(name.to_string())),
            Some(token) => Err(format!("unexpected {:?}", token)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}
