//! Linear multi-step text entry shared by post, comment, registration and
//! search forms.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Purpose {
    Post { community: String },
    Comment { post_id: String },
    Register,
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub prompt: &'static str,
    pub placeholder: &'static str,
    pub value: String,
}

impl Step {
    fn new(prompt: &'static str, placeholder: &'static str) -> Self {
        Self {
            prompt,
            placeholder,
            value: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Editing,
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirm {
    /// Empty input, or a submission is already in flight.
    Ignored,
    Advanced,
    /// The last step was filled; carries every step's value in order.
    Submit(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Composer {
    purpose: Purpose,
    steps: Vec<Step>,
    current: usize,
    input: String,
    submission: Submission,
}

impl Composer {
    pub fn new(purpose: Purpose, steps: Vec<Step>) -> Self {
        Self {
            purpose,
            steps,
            current: 0,
            input: String::new(),
            submission: Submission::Editing,
        }
    }

    pub fn new_post(community: impl Into<String>) -> Self {
        Self::new(
            Purpose::Post {
                community: community.into(),
            },
            vec![
                Step::new("Title:", "Give your post a title..."),
                Step::new("Content:", "Write your content..."),
            ],
        )
    }

    pub fn new_comment(post_id: impl Into<String>) -> Self {
        Self::new(
            Purpose::Comment {
                post_id: post_id.into(),
            },
            vec![Step::new("Comment:", "Write a comment...")],
        )
    }

    pub fn register() -> Self {
        Self::new(
            Purpose::Register,
            vec![
                Step::new("First, let's name your AI agent:", "agent name"),
                Step::new("Now, give it a short description:", "What does your agent do?"),
            ],
        )
    }

    pub fn search() -> Self {
        Self::new(Purpose::Search, vec![Step::new("Search:", "Search posts...")])
    }

    pub fn purpose(&self) -> &Purpose {
        &self.purpose
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn current_step(&self) -> usize {
        self.current
    }

    pub fn step(&self) -> Option<&Step> {
        self.steps.get(self.current)
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_submitting(&self) -> bool {
        self.submission == Submission::InFlight
    }

    pub fn insert(&mut self, ch: char) {
        if !self.is_submitting() {
            self.input.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        if !self.is_submitting() {
            self.input.pop();
        }
    }

    pub fn confirm(&mut self) -> Confirm {
        if self.is_submitting() {
            return Confirm::Ignored;
        }
        let value = self.input.trim().to_string();
        if value.is_empty() {
            return Confirm::Ignored;
        }
        let Some(step) = self.steps.get_mut(self.current) else {
            return Confirm::Ignored;
        };
        step.value = value;

        if self.current + 1 < self.steps.len() {
            self.current += 1;
            self.input = self.steps[self.current].value.clone();
            return Confirm::Advanced;
        }

        self.submission = Submission::InFlight;
        Confirm::Submit(self.values())
    }

    /// Submits again with the values kept from a failed attempt.
    pub fn resubmit(&mut self) -> Option<Vec<String>> {
        if self.is_submitting() || self.steps.iter().any(|step| step.value.is_empty()) {
            return None;
        }
        self.submission = Submission::InFlight;
        Some(self.values())
    }

    /// Reopens the form after a failed submission. Entered values stay.
    pub fn fail(&mut self) {
        self.submission = Submission::Editing;
    }

    pub fn values(&self) -> Vec<String> {
        self.steps.iter().map(|step| step.value.clone()).collect()
    }
}
