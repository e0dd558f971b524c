//! Test doubles: a fake process with a descriptor table, and a tracing layer
//! that records events.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use super::ops::{DescriptorLimit, Fd, ForkOutcome, ProcessOps};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Fork,
    Exit(i32),
    CreateSession,
    IgnoreHangup,
    SetUmask(u32),
    ChangeDir(PathBuf),
    DescriptorLimit,
    IsTerminal(Fd),
    Close(Fd),
    Open(PathBuf),
    Duplicate(Fd, Fd),
}

/// A process whose descriptor table maps numbers to labels such as `"tty"`,
/// `"log"` or `"null"`. Every call is recorded in order.
pub(crate) struct FakeProcess {
    pub supported: bool,
    pub forks: RefCell<VecDeque<io::Result<ForkOutcome>>>,
    pub limit: DescriptorLimit,
    pub table: RefCell<BTreeMap<Fd, String>>,
    pub failing_close: HashSet<Fd>,
    pub fail_session: bool,
    pub fail_chdir: bool,
    pub umask: Cell<u32>,
    pub cwd: RefCell<PathBuf>,
    pub calls: RefCell<Vec<Call>>,
}

impl FakeProcess {
    pub fn new() -> Self {
        Self {
            supported: true,
            forks: RefCell::new(VecDeque::new()),
            limit: DescriptorLimit::Finite(16),
            table: RefCell::new(BTreeMap::new()),
            failing_close: HashSet::new(),
            fail_session: false,
            fail_chdir: false,
            umask: Cell::new(0o022),
            cwd: RefCell::new(PathBuf::from("/home/user/project")),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Every fork lands in the child.
    pub fn always_child(self) -> Self {
        self.forks
            .borrow_mut()
            .extend([Ok(ForkOutcome::Child), Ok(ForkOutcome::Child)]);
        self
    }

    pub fn with_fd(self, fd: Fd, label: &str) -> Self {
        self.table.borrow_mut().insert(fd, label.to_string());
        self
    }

    pub fn label(&self, fd: Fd) -> Option<String> {
        self.table.borrow().get(&fd).cloned()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }
}

fn bad_descriptor() -> io::Error {
    io::Error::from_raw_os_error(9)
}

impl ProcessOps for FakeProcess {
    fn supports_daemon(&self) -> bool {
        self.supported
    }

    fn fork(&self) -> io::Result<ForkOutcome> {
        self.record(Call::Fork);
        self.forks
            .borrow_mut()
            .pop_front()
            .unwrap_or(Ok(ForkOutcome::Child))
    }

    fn exit_now(&self, status: i32) -> ! {
        self.record(Call::Exit(status));
        panic!("exit_now({status})");
    }

    fn create_session(&self) -> io::Result<()> {
        self.record(Call::CreateSession);
        if self.fail_session {
            return Err(io::Error::from_raw_os_error(1));
        }
        Ok(())
    }

    fn ignore_hangup(&self) -> io::Result<()> {
        self.record(Call::IgnoreHangup);
        Ok(())
    }

    fn set_umask(&self, mask: u32) -> u32 {
        self.record(Call::SetUmask(mask));
        self.umask.replace(mask)
    }

    fn change_dir(&self, dir: &Path) -> io::Result<()> {
        self.record(Call::ChangeDir(dir.to_path_buf()));
        if self.fail_chdir {
            return Err(io::Error::from_raw_os_error(2));
        }
        *self.cwd.borrow_mut() = dir.to_path_buf();
        Ok(())
    }

    fn descriptor_limit(&self) -> io::Result<DescriptorLimit> {
        self.record(Call::DescriptorLimit);
        Ok(self.limit)
    }

    fn is_terminal(&self, fd: Fd) -> bool {
        self.record(Call::IsTerminal(fd));
        self.label(fd).as_deref() == Some("tty")
    }

    fn close(&self, fd: Fd) -> io::Result<()> {
        self.record(Call::Close(fd));
        if self.failing_close.contains(&fd) {
            return Err(bad_descriptor());
        }
        self.table
            .borrow_mut()
            .remove(&fd)
            .map(|_| ())
            .ok_or_else(bad_descriptor)
    }

    fn open_read_write(&self, path: &Path) -> io::Result<Fd> {
        self.record(Call::Open(path.to_path_buf()));
        let mut table = self.table.borrow_mut();
        let fd = (0..).find(|fd| !table.contains_key(fd)).unwrap_or(0);
        table.insert(fd, "null".to_string());
        Ok(fd)
    }

    fn duplicate_onto(&self, src: Fd, dst: Fd) -> io::Result<()> {
        self.record(Call::Duplicate(src, dst));
        let mut table = self.table.borrow_mut();
        let label = table.get(&src).cloned().ok_or_else(bad_descriptor)?;
        table.insert(dst, label);
        Ok(())
    }
}

/// Collects `(level, message)` for every event it sees.
#[derive(Clone, Default)]
pub(crate) struct EventLog(Arc<Mutex<Vec<(Level, String)>>>);

impl EventLog {
    pub fn dispatch(&self) -> Dispatch {
        Dispatch::new(tracing_subscriber::registry().with(self.clone()))
    }

    pub fn count(&self, level: Level) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }

    pub fn messages(&self, level: Level) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for EventLog {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), visitor.0));
    }
}
