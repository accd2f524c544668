/// The replica set as this node knows it, never including itself.
#[derive(Debug, Clone)]
pub struct Roster {
    self_address: String,
    members: Vec<String>,
}

impl Roster {
    pub fn new(self_address: &str, initial: &[String]) -> Self {
        let mut roster = Self {
            self_address: self_address.to_string(),
            members: Vec::new(),
        };
        roster.replace(initial);
        roster
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.members.iter().any(|m| m == address)
    }

    /// Returns whether `address` was new.
    pub fn add(&mut self, address: &str) -> bool {
        if address == self.self_address || self.contains(address) {
            return false;
        }
        self.members.push(address.to_string());
        true
    }

    pub fn remove(&mut self, address: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m != address);
        before != self.members.len()
    }

    /// Replaces the roster wholesale, dropping this node's own address and
    /// duplicates.
    pub fn replace(&mut self, addresses: &[String]) {
        self.members.clear();
        for address in addresses {
            self.add(address);
        }
    }

    pub fn without(&self, address: &str) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| *m != address)
            .cloned()
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.members)
    }

    pub fn parse_json(json: &str) -> Result<Vec<String>, serde_json::Error> {
        serde_json::from_str(json)
    }
}
