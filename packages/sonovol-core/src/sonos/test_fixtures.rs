//! Shared NOTIFY payloads for parser, subscription and listener tests.

/// AVTransport NOTIFY: line-in playing, with entity-encoded DIDL metadata
/// nested inside the entity-encoded `LastChange` document.
pub const TRANSPORT_NOTIFY_LINE_IN: &str = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property>
    <LastChange>&lt;Event xmlns=&quot;urn:schemas-upnp-org:metadata-1-0/AVT/&quot;&gt;
      &lt;InstanceID val=&quot;0&quot;&gt;
        &lt;TransportState val=&quot;PLAYING&quot;/&gt;
        &lt;CurrentTrackURI val=&quot;x-rincon-stream:RINCON_LIVING01400&quot;/&gt;
        &lt;CurrentTrackMetaData val=&quot;&amp;lt;DIDL-Lite&amp;gt;&amp;lt;item&amp;gt;&amp;lt;dc:title&amp;gt;Line-In&amp;lt;/dc:title&amp;gt;&amp;lt;/item&amp;gt;&amp;lt;/DIDL-Lite&amp;gt;&quot;/&gt;
      &lt;/InstanceID&gt;
    &lt;/Event&gt;</LastChange>
  </e:property>
</e:propertyset>"#;

/// AVTransport NOTIFY: paused with a streaming URI carrying an escaped `&`.
pub const TRANSPORT_NOTIFY_PAUSED_STREAM: &str = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property>
    <LastChange>&lt;Event xmlns=&quot;urn:schemas-upnp-org:metadata-1-0/AVT/&quot;&gt;
      &lt;InstanceID val=&quot;0&quot;&gt;
        &lt;TransportState val=&quot;PAUSED_PLAYBACK&quot;/&gt;
        &lt;CurrentTrackURI val=&quot;x-sonos-spotify:spotify%3atrack%3a1?sid=12&amp;amp;flags=8224&quot;/&gt;
        &lt;CurrentTrackMetaData val=&quot;&quot;/&gt;
      &lt;/InstanceID&gt;
    &lt;/Event&gt;</LastChange>
  </e:property>
</e:propertyset>"#;

/// RenderingControl NOTIFY from a stereo pair: per-channel values plus Master.
pub const RENDERING_NOTIFY_STEREO: &str = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property>
    <LastChange>&lt;Event xmlns=&quot;urn:schemas-upnp-org:metadata-1-0/RCS/&quot;&gt;
      &lt;InstanceID val=&quot;0&quot;&gt;
        &lt;Volume channel=&quot;LF&quot; val=&quot;100&quot;/&gt;
        &lt;Volume channel=&quot;RF&quot; val=&quot;100&quot;/&gt;
        &lt;Volume channel=&quot;Master&quot; val=&quot;42&quot;/&gt;
        &lt;Mute channel=&quot;Master&quot; val=&quot;1&quot;/&gt;
      &lt;/InstanceID&gt;
    &lt;/Event&gt;</LastChange>
  </e:property>
</e:propertyset>"#;

/// ZoneGroupTopology NOTIFY: Kitchen alone, Living Room leading Den and Office.
pub const TOPOLOGY_NOTIFY_TWO_GROUPS: &str = r#"<?xml version="1.0"?>
<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
  <e:property>
    <ZoneGroupState>&lt;ZoneGroupState&gt;&lt;ZoneGroups&gt;&lt;ZoneGroup Coordinator=&quot;RINCON_KITCHEN01400&quot; ID=&quot;RINCON_KITCHEN01400:1&quot;&gt;&lt;ZoneGroupMember UUID=&quot;RINCON_KITCHEN01400&quot; Location=&quot;http://10.0.0.2:1400/xml/device_description.xml&quot; ZoneName=&quot;Kitchen&quot;/&gt;&lt;/ZoneGroup&gt;&lt;ZoneGroup Coordinator=&quot;RINCON_LIVING01400&quot; ID=&quot;RINCON_LIVING01400:7&quot;&gt;&lt;ZoneGroupMember UUID=&quot;RINCON_LIVING01400&quot; Location=&quot;http://10.0.0.3:1400/xml/device_description.xml&quot; ZoneName=&quot;Living Room&quot;/&gt;&lt;ZoneGroupMember UUID=&quot;RINCON_DEN01400&quot; Location=&quot;http://10.0.0.4:1400/xml/device_description.xml&quot; ZoneName=&quot;Den&quot;/&gt;&lt;ZoneGroupMember UUID=&quot;RINCON_OFFICE01400&quot; Location=&quot;http://10.0.0.5:1400/xml/device_description.xml&quot; ZoneName=&quot;Office&quot;/&gt;&lt;/ZoneGroup&gt;&lt;/ZoneGroups&gt;&lt;/ZoneGroupState&gt;</ZoneGroupState>
  </e:property>
</e:propertyset>"#;
