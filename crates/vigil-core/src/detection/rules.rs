//! Pattern rule sets, one per category.
//!
//! Each pattern is case-insensitive. When a pattern has a capture group,
//! group 1 is the signal content; otherwise the whole match is.

use once_cell::sync::Lazy;
use regex::Regex;
use strum::IntoEnumIterator;
use tracing::warn;

use crate::types::SignalCategory;

const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";
const WEEKDAY: &str = r"(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)";
const DEADLINE_CUE: &str =
    r"(?:by|due(?:\s+(?:on|by))?|before|until|till|no later than|deadline(?:\s+is)?:?)";

const COMMITMENT: &[&str] = &[
    r"(?i)\b(?:i'll|i’ll|i will|i'm going to|i’m going to|i am going to|i'm gonna|i’m gonna|i promise to|let me|we'll|we’ll|we will)\s+([^.!?;\n]+)",
    r"(?i)\b(?:i|we) (?:promised|committed|agreed) to\s+([^.!?;\n]+)",
    r"(?i)\bi (?:need to|have to|must|owe you)\s+([^.!?;\n]+)",
];

const FOLLOW_UP: &[&str] = &[
    r"(?i)\b(?:follow(?:ing)?[- ]up (?:on|with|about|regarding)|circle back (?:on|to|with)|check back (?:on|with|in on)|touch base (?:on|with|about)|get back to (?:you|him|her|them) (?:on|about|regarding))\s+([^.!?;\n]+)",
    r"(?i)\bremind (?:me|us) to\s+([^.!?;\n]+)",
    r"(?i)\b(?:ping|nudge|chase)\s+((?:him|her|them|\w+)\s+(?:about|on|re|regarding)\s+[^.!?;\n]+)",
];

const DEPENDENCY: &[&str] = &[
    r"(?i)\b(?:blocked (?:on|by)|waiting (?:on|for)|depends on|dependent on|contingent on)\s+([^.!?;\n]+)",
    r"(?i)\bcan(?:'t|’t|not) (?:start|proceed|continue|move forward|ship|finish)(?: \w+)? (?:until|without)\s+([^.!?;\n]+)",
    r"(?i)\bneeds? (?:sign-?off|approval|input|a green light|the go-ahead) from\s+([^.!?;\n]+)",
];

const CONTRADICTION: &[&str] = &[
    r"(?i)(?:^|[.!?;]\s+)(?:actually|on second thought|scratch that|correction|wait,? no|never ?mind)\b[,:;]?\s*([^.!?\n]*)",
    r"(?i)\b(?:what i meant was|i was wrong about|i misspoke about|that's not right|that’s not right|i take (?:that|it) back|contrary to what i said)\b[,:;]?\s*([^.!?\n]*)",
];

const OPEN_QUESTION: &[&str] = &[
    r"(?i)\b((?:should|do|did|have|can|could|would|will) (?:we|i|they)\b[^?.!\n]{2,120}\?)",
    r"(?i)\b((?:what|how|who|when|where|why|which) (?:about|if|do|does|did|should|will|is|are|was|were|can)\b[^?.!\n]{2,120}\?)",
    r"(?i)\b(?:not sure (?:if|whether|about|how|what|when|who)|still (?:unclear|undecided|unknown)|open question:?|tbd:?|need to (?:figure out|decide))\s+([^.!?;\n]+)",
];

const PEOPLE_WAITING: &[&str] = &[
    r"(?i)\b(\w+(?:\s+\w+)?\s+(?:is|are|has been|have been|was|were)\s+(?:still\s+)?waiting (?:on|for) (?:me|us|my|our)\b[^.!?;\n]*)",
    r"(?i)\b(?:i|we) (?:still )?owe\s+([^.!?;\n]+)",
    r"(?i)\b(?:haven't|haven’t|have not|never|still haven't) (?:replied|responded|gotten back|written back|answered)(?: to)?\s+([^.!?;\n]+)",
    r"(?i)\b(\w+ (?:asked|is asking|keeps asking|has been asking) (?:me|us) (?:for|about|to)\s+[^.!?;\n]+)",
];

const RECURRING_PATTERN: &[&str] = &[
    r"(?i)\b((?:every|each)\s+(?:other\s+)?(?:day|morning|afternoon|evening|night|week|month|quarter|year|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b[^.!?;\n]*)",
    r"(?i)\b((?:weekly|daily|monthly|quarterly|biweekly|bi-weekly|annual|yearly)\s+(?:meeting|sync|standup|stand-up|review|report|check-in|1:1|one-on-one|retro|planning)s?\b[^.!?;\n]*)",
    r"(?i)\b((?:this|it|that) (?:keeps|kept) (?:happening|coming up|breaking)[^.!?;\n]*)",
    r"(?i)\b((?:[\w']+\s+){1,6}(?:again|as usual|like last time|like always))\b",
];

const STALE_DECISION: &[&str] = &[
    r"(?i)\b(?:we|i|they) (?:decided|agreed|settled on|chose|opted|went with)(?: to| on)?\s+([^.!?;\n]+)",
    r"(?i)\b(?:the decision (?:was|is)|final decision:?|we're going with|we’re going with|let's go with|let’s go with)\s+([^.!?;\n]+)",
];

const CONTEXT_DECAY: &[&str] = &[
    r"(?i)\b(?:as (?:i|we) (?:mentioned|discussed|said|talked about)(?: earlier| before| last (?:week|time|month))?|last time we (?:talked|spoke|discussed|met)|remember (?:when|that|how)|a while (?:back|ago)|(?:a few|a couple of|several|two|three) (?:weeks|months) ago)\b[,:]?\s*([^.!?;\n]*)",
    r"(?i)\b((?:the|our|my) (?:old|previous|original|earlier) (?:plan|notes|numbers|spec|estimate|version|doc|document)\b[^.!?;\n]*)",
];

const UNFINISHED_WORK: &[&str] = &[
    r"(?i)\b(?:still need to|haven't (?:finished|completed|wrapped up)|have not (?:finished|completed)|need to finish|left off (?:at|on|with)|didn't (?:finish|get to))\s+([^.!?;\n]+)",
    r"(?i)\b((?:the |my |our )?[\w-]+(?:\s+[\w-]+){0,4}\s+(?:is|are) (?:still )?(?:half[- ]done|in progress|unfinished|incomplete|a work in progress))\b",
    r"(?i)\b(?:todo|to-do|wip)\b[:\-]?\s*([^.!?;\n]+)",
];

const PATTERN_BREAK: &[&str] = &[
    r"(?i)\b(?:unlike (?:usual|last time|before|always)|for the first time|out of character|not like (?:him|her|them|us|me) to)\b[,:]?\s*([^.!?;\n]*)",
    r"(?i)\b((?:normally|usually|typically|always)\b[^.!?;\n]{3,80}\bbut\b[^.!?;\n]*)",
    r"(?i)\b((?:skipped|missed|cancell?ed|postponed|moved) (?:the|our|my|this week's|today's|tomorrow's) [^.!?;\n]*(?:meeting|sync|standup|stand-up|review|1:1|check-in|call|workout|session)s?)\b",
    r"(?i)\b((?:\w+ )?(?:hasn't|haven't|didn't) (?:shown up|checked in|posted|replied|responded) (?:in|for) (?:days|a week|weeks|a while))\b",
];

fn deadline_sources() -> Vec<String> {
    vec![
        format!(
            r"(?i)\b(?:{cue}|on)\s+({month}\.?\s+\d{{1,2}}(?:st|nd|rd|th)?(?:,?\s+\d{{4}})?|\d{{1,2}}/\d{{1,2}}(?:/\d{{2,4}})?|\d{{4}}-\d{{1,2}}-\d{{1,2}})",
            cue = DEADLINE_CUE,
            month = MONTH
        ),
        format!(
            r"(?i)\b{cue}\s+((?:the\s+)?(?:end of (?:the |this )?(?:day|week|month)|eod|eow|eom|tomorrow|today|tonight|next (?:week|month)|(?:this |next )?{weekday}))\b",
            cue = DEADLINE_CUE,
            weekday = WEEKDAY
        ),
        r"(?i)\b(?:due|needed|deadline)\s+(in\s+(?:\d{1,3}|a|an|one|two|three|four|five|six|seven|eight|nine|ten)\s+(?:day|week|month)s?)\b".to_string(),
        r"(?i)\b((?:before|ahead of|prior to|after)\s+the\s+[\w' -]{1,40}?(?:meeting|launch|review|demo|release|offsite|presentation|board call))\b".to_string(),
    ]
}

/// Compiled patterns for one category.
#[derive(Debug)]
pub struct RuleSet {
    pub category: SignalCategory,
    pub patterns: Vec<Regex>,
}

impl RuleSet {
    /// Compile `sources`; a pattern that fails to compile is logged and
    /// left out without affecting the others.
    pub fn compile<S: AsRef<str>>(category: SignalCategory, sources: &[S]) -> Self {
        let patterns = sources
            .iter()
            .filter_map(|source| match Regex::new(source.as_ref()) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(
                        category = %category,
                        pattern = source.as_ref(),
                        error = %e,
                        "Skipping detection rule that failed to compile"
                    );
                    None
                }
            })
            .collect();
        Self { category, patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

fn sources_for(category: SignalCategory) -> Vec<String> {
    let fixed: &[&str] = match category {
        SignalCategory::Deadline => return deadline_sources(),
        SignalCategory::Commitment => COMMITMENT,
        SignalCategory::FollowUp => FOLLOW_UP,
        SignalCategory::Dependency => DEPENDENCY,
        SignalCategory::Contradiction => CONTRADICTION,
        SignalCategory::OpenQuestion => OPEN_QUESTION,
        SignalCategory::PeopleWaiting => PEOPLE_WAITING,
        SignalCategory::RecurringPattern => RECURRING_PATTERN,
        SignalCategory::StaleDecision => STALE_DECISION,
        SignalCategory::ContextDecay => CONTEXT_DECAY,
        SignalCategory::UnfinishedWork => UNFINISHED_WORK,
        SignalCategory::PatternBreak => PATTERN_BREAK,
    };
    fixed.iter().map(|s| s.to_string()).collect()
}

static RULE_SETS: Lazy<Vec<RuleSet>> = Lazy::new(|| {
    SignalCategory::iter()
        .map(|category| RuleSet::compile(category, &sources_for(category)))
        .collect()
});

/// The built-in rule set for a category.
pub fn rule_set(category: SignalCategory) -> &'static RuleSet {
    // RULE_SETS is built from `SignalCategory::iter()`, so declaration
    // order and vector index agree.
    &RULE_SETS[category as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_rule_compiles() {
        for category in SignalCategory::iter() {
            let rules = rule_set(category);
            assert_eq!(rules.category, category);
            assert_eq!(
                rules.patterns.len(),
                sources_for(category).len(),
                "{category} lost a pattern"
            );
        }
    }

    #[test]
    fn test_bad_pattern_is_skipped() {
        let rules = RuleSet::compile(
            SignalCategory::FollowUp,
            &[r"(?i)follow up on (\w+)", r"(unclosed", r"(?i)circle back"],
        );
        assert_eq!(rules.patterns.len(), 2);
        assert!(!rules.is_empty());

        let broken = RuleSet::compile(SignalCategory::FollowUp, &[r"(unclosed"]);
        assert!(broken.is_empty());
    }

    #[test]
    fn test_deadline_patterns_capture_date_phrase() {
        let rules = rule_set(SignalCategory::Deadline);
        let caps = rules
            .patterns
            .iter()
            .find_map(|p| p.captures("Submit by 12/27"))
            .unwrap();
        assert_eq!(&caps[1], "12/27");

        let caps = rules
            .patterns
            .iter()
            .find_map(|p| p.captures("ship it before the Q3 planning meeting"))
            .unwrap();
        assert_eq!(&caps[1], "before the Q3 planning meeting");
    }
}
